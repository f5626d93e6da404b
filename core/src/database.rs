//! Layout: `<root>/<gem-name>/<advisory-id>.yml`, one advisory per file.

use crate::advisory::Advisory;
use crate::error::{GemauditError, Result};
use crate::requirement::RequirementSet;
use crate::version::Version;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

const ADVISORY_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// An operator-declared `"<identifier>@<requirement>"` exception: versions
/// matching `requirement` count as patched for the named advisory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeVersion {
    identifier: String,
    requirement: RequirementSet,
}

impl SafeVersion {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| GemauditError::InvalidOverride {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (identifier, requirement) = value
            .split_once('@')
            .ok_or_else(|| invalid("expected '<identifier>@<version>'"))?;

        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(invalid("missing advisory identifier"));
        }

        let requirement =
            RequirementSet::parse(requirement).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            identifier: identifier.to_string(),
            requirement,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn requirement(&self) -> &RequirementSet {
        &self.requirement
    }
}

impl FromStr for SafeVersion {
    type Err = GemauditError;

    fn from_str(s: &str) -> Result<Self> {
        SafeVersion::parse(s)
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    safe_versions: Vec<SafeVersion>,
}

impl Database {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.is_dir() {
            return Err(GemauditError::InvalidDatabase {
                path,
                reason: "not a directory".to_string(),
            });
        }

        Ok(Self {
            path,
            safe_versions: Vec::new(),
        })
    }

    /// Parses `"<identifier>@<requirement>"` overrides and applies them to
    /// every advisory this database loads.
    pub fn with_safe_versions<I, S>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            self.safe_versions.push(SafeVersion::parse(value.as_ref())?);
        }
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn safe_versions(&self) -> &[SafeVersion] {
        &self.safe_versions
    }

    /// Every advisory, grouped by gem directory, in file-name order.
    pub fn advisories(&self) -> impl Iterator<Item = Advisory> + '_ {
        advisory_paths(&self.path, 2).filter_map(move |path| self.load(&path))
    }

    /// Advisories filed under `name`. Unknown gems yield nothing.
    pub fn advisories_for(&self, name: &str) -> impl Iterator<Item = Advisory> + '_ {
        self.gem_dir(name)
            .into_iter()
            .flat_map(|dir| advisory_paths(&dir, 1))
            .filter_map(move |path| self.load(&path))
    }

    /// Advisories for `name` that `version` is vulnerable to.
    pub fn check(&self, name: &str, version: &Version) -> impl Iterator<Item = Advisory> + '_ {
        let version = version.clone();
        self.advisories_for(name)
            .filter(move |advisory| advisory.is_vulnerable(&version))
    }

    /// Number of advisory files. Records are counted, not parsed.
    pub fn size(&self) -> usize {
        advisory_paths(&self.path, 2).count()
    }

    pub fn size_for(&self, name: &str) -> usize {
        self.gem_dir(name)
            .map(|dir| advisory_paths(&dir, 1).count())
            .unwrap_or(0)
    }

    /// Gem names that have an advisory directory, sorted.
    pub fn gems(&self) -> Vec<String> {
        WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn gem_dir(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            debug!(name, "rejecting gem name that is not a plain directory name");
            return None;
        }

        let dir = self.path.join(name);
        dir.is_dir().then_some(dir)
    }

    fn load(&self, path: &Path) -> Option<Advisory> {
        let mut advisory = match Advisory::load(path) {
            Ok(advisory) => advisory,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping advisory");
                return None;
            }
        };

        for safe in &self.safe_versions {
            if advisory.matches_identifier(&safe.identifier) {
                debug!(
                    advisory = advisory.id(),
                    requirement = %safe.requirement,
                    "applying safe-version override"
                );
                advisory.add_patched_requirement(safe.requirement.clone());
            }
        }

        Some(advisory)
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_advisory_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ADVISORY_EXTENSIONS.contains(&ext))
}

/// Advisory files exactly `depth` levels below `root`, in file-name order.
fn advisory_paths(root: &Path, depth: usize) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .min_depth(depth)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable database entry");
                None
            }
        })
        .filter(is_advisory_file)
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CVE_2013_0156: &str = r#"---
gem: actionpack
cve: 2013-0156
osvdb: 89026
title: Action Pack Type Casting Parameter Parsing Remote Code Execution
cvss_v2: 10.0
patched_versions:
  - ~> 2.3.15
  - ~> 3.0.19
  - ~> 3.1.10
  - ">= 3.2.11"
"#;

    const CVE_2013_0276: &str = r#"---
gem: activerecord
cve: 2013-0276
cvss_v2: 4.3
patched_versions:
  - ~> 2.3.17
  - ~> 3.1.11
  - ">= 3.2.12"
"#;

    const CVE_2013_0155: &str = r#"---
gem: activerecord
cve: 2013-0155
cvss_v2: 7.5
patched_versions:
  - ~> 2.3.16
  - ~> 3.0.19
  - ~> 3.1.10
  - ">= 3.2.11"
"#;

    fn write_advisory(root: &Path, gem: &str, id: &str, content: &str) {
        let dir = root.join(gem);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.yml", id)), content).unwrap();
    }

    fn fixture() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        write_advisory(temp_dir.path(), "actionpack", "CVE-2013-0156", CVE_2013_0156);
        write_advisory(temp_dir.path(), "activerecord", "CVE-2013-0276", CVE_2013_0276);
        write_advisory(temp_dir.path(), "activerecord", "CVE-2013-0155", CVE_2013_0155);
        temp_dir
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_open_rejects_non_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        fs::write(&file, "").unwrap();

        assert!(matches!(
            Database::open(&file),
            Err(GemauditError::InvalidDatabase { .. })
        ));
        assert!(Database::open("/foo/bar/baz").is_err());
    }

    #[test]
    fn test_advisories_enumerates_all_records() {
        let temp_dir = fixture();
        let db = Database::open(temp_dir.path()).unwrap();

        let ids: Vec<String> = db.advisories().map(|a| a.id().to_string()).collect();
        assert_eq!(ids, vec!["CVE-2013-0156", "CVE-2013-0155", "CVE-2013-0276"]);
        assert_eq!(db.size(), 3);
    }

    #[test]
    fn test_advisories_for_gem() {
        let temp_dir = fixture();
        let db = Database::open(temp_dir.path()).unwrap();

        assert_eq!(db.advisories_for("activerecord").count(), 2);
        assert!(db.advisories_for("activerecord").all(|a| a.gem() == "activerecord"));
        assert_eq!(db.size_for("activerecord"), 2);
    }

    #[test]
    fn test_advisories_for_unknown_gem_is_empty() {
        let temp_dir = fixture();
        let db = Database::open(temp_dir.path()).unwrap();

        assert_eq!(db.advisories_for("sinatra").count(), 0);
        assert_eq!(db.advisories_for("../etc").count(), 0);
        assert_eq!(db.advisories_for("").count(), 0);
        assert_eq!(db.size_for("sinatra"), 0);
    }

    #[test]
    fn test_check_filters_by_vulnerability() {
        let temp_dir = fixture();
        let db = Database::open(temp_dir.path()).unwrap();

        let hits: Vec<Advisory> = db.check("actionpack", &v("3.2.10")).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].primary_identifier(), "CVE-2013-0156");

        assert_eq!(db.check("actionpack", &v("3.2.11")).count(), 0);
        assert_eq!(db.check("activerecord", &v("3.2.10")).count(), 2);
        assert_eq!(db.check("activerecord", &v("3.2.11")).count(), 1);
        assert_eq!(db.check("activerecord", &v("3.2.12")).count(), 0);
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let temp_dir = fixture();
        write_advisory(temp_dir.path(), "actionpack", "BROKEN", "gem: [unterminated\n");
        let db = Database::open(temp_dir.path()).unwrap();

        assert_eq!(db.size(), 4);
        assert_eq!(db.advisories().count(), 3);
        assert_eq!(db.check("actionpack", &v("3.2.10")).count(), 1);
    }

    #[test]
    fn test_ignores_non_advisory_entries() {
        let temp_dir = fixture();
        fs::write(temp_dir.path().join("README.md"), "# advisories").unwrap();
        fs::write(temp_dir.path().join("actionpack").join("notes.txt"), "x").unwrap();
        write_advisory(temp_dir.path(), ".git", "HEAD", "gem: nope\n");

        let db = Database::open(temp_dir.path()).unwrap();
        assert_eq!(db.size(), 3);
        assert_eq!(db.gems(), vec!["actionpack", "activerecord"]);
    }

    #[test]
    fn test_safe_versions_apply_per_instance() {
        let temp_dir = fixture();
        let plain = Database::open(temp_dir.path()).unwrap();
        let overridden = Database::open(temp_dir.path())
            .unwrap()
            .with_safe_versions(["CVE-2013-0156@3.2.10"])
            .unwrap();

        assert_eq!(overridden.check("actionpack", &v("3.2.10")).count(), 0);
        assert_eq!(overridden.check("actionpack", &v("3.2.9")).count(), 1);
        assert_eq!(plain.check("actionpack", &v("3.2.10")).count(), 1);
        assert_eq!(overridden.check("activerecord", &v("3.2.10")).count(), 2);
    }

    #[test]
    fn test_safe_versions_match_any_identifier_form() {
        let temp_dir = fixture();

        for identifier in ["CVE-2013-0156", "2013-0156", "OSVDB-89026"] {
            let db = Database::open(temp_dir.path())
                .unwrap()
                .with_safe_versions([format!("{}@~> 3.2.10", identifier)])
                .unwrap();
            assert_eq!(db.check("actionpack", &v("3.2.10")).count(), 0, "{}", identifier);
        }
    }

    #[test]
    fn test_safe_versions_reject_malformed() {
        let temp_dir = fixture();
        let open = || Database::open(temp_dir.path()).unwrap();

        assert!(matches!(
            open().with_safe_versions(["CVE-2013-0156"]),
            Err(GemauditError::InvalidOverride { .. })
        ));
        assert!(open().with_safe_versions(["@1.0"]).is_err());
        assert!(open().with_safe_versions(["CVE-2013-0156@"]).is_err());
    }

    #[test]
    fn test_shared_across_threads() {
        let temp_dir = fixture();
        let db = Database::open(temp_dir.path()).unwrap();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| db.check("activerecord", &v("3.2.10")).count()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), 2);
            }
        });
    }

    #[test]
    fn test_display_is_path() {
        let temp_dir = fixture();
        let db = Database::open(temp_dir.path()).unwrap();
        assert_eq!(db.to_string(), temp_dir.path().display().to_string());
    }
}
