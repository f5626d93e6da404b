use crate::error::{GemauditError, Result};
use crate::requirement::RequirementSet;
use crate::version::Version;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Unknown,
    Low,
    Medium,
    High,
}

impl Criticality {
    /// CVSS v3 takes precedence over v2. Scores of 7.0 and above are high
    /// under both scales.
    pub fn from_cvss(cvss_v2: Option<f64>, cvss_v3: Option<f64>) -> Self {
        match (cvss_v3, cvss_v2) {
            (Some(score), _) | (None, Some(score)) => Self::from_score(score),
            (None, None) => Criticality::Unknown,
        }
    }

    fn from_score(score: f64) -> Self {
        if !(0.0..=10.0).contains(&score) {
            Criticality::Unknown
        } else if score < 4.0 {
            Criticality::Low
        } else if score < 7.0 {
            Criticality::Medium
        } else {
            Criticality::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Unknown => "Unknown",
            Criticality::Low => "Low",
            Criticality::Medium => "Medium",
            Criticality::High => "High",
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// YAML fields that are sometimes written as bare numbers (`osvdb: 89026`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(u64),
    Float(f64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Integer(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AdvisoryRecord {
    gem: String,
    cve: Option<Scalar>,
    osvdb: Option<Scalar>,
    ghsa: Option<Scalar>,
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    date: Option<NaiveDate>,
    cvss_v2: Option<f64>,
    cvss_v3: Option<f64>,
    patched_versions: Option<Vec<String>>,
    unaffected_versions: Option<Vec<String>>,
}

/// One vulnerability record for a named gem.
#[derive(Debug, Clone, Serialize)]
pub struct Advisory {
    id: String,
    gem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cve: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    osvdb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ghsa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cvss_v2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cvss_v3: Option<f64>,
    criticality: Criticality,
    patched_versions: Vec<RequirementSet>,
    unaffected_versions: Vec<RequirementSet>,
}

impl Advisory {
    /// Loads the record at `path`. The file stem becomes the advisory id.
    pub fn load(path: &Path) -> Result<Self> {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = fs::read_to_string(path)?;

        Self::decode(&id, &content).map_err(|reason| GemauditError::InvalidAdvisory {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_yaml(id: &str, content: &str) -> Result<Self> {
        Self::decode(id, content).map_err(|reason| GemauditError::InvalidAdvisory {
            path: PathBuf::from(id),
            reason,
        })
    }

    fn decode(id: &str, content: &str) -> std::result::Result<Self, String> {
        let record: AdvisoryRecord = serde_yaml::from_str(content).map_err(|e| e.to_string())?;

        if record.gem.trim().is_empty() {
            return Err("'gem' must not be empty".to_string());
        }

        let patched_versions =
            parse_requirements(record.patched_versions).map_err(|e| e.to_string())?;
        let unaffected_versions =
            parse_requirements(record.unaffected_versions).map_err(|e| e.to_string())?;

        Ok(Self {
            id: id.to_string(),
            gem: record.gem,
            cve: record.cve.map(Scalar::into_string),
            osvdb: record.osvdb.map(Scalar::into_string),
            ghsa: record.ghsa.map(Scalar::into_string),
            url: record.url,
            title: record.title,
            description: record.description,
            date: record.date,
            cvss_v2: record.cvss_v2,
            cvss_v3: record.cvss_v3,
            criticality: Criticality::from_cvss(record.cvss_v2, record.cvss_v3),
            patched_versions,
            unaffected_versions,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn gem(&self) -> &str {
        &self.gem
    }

    pub fn cve(&self) -> Option<&str> {
        self.cve.as_deref()
    }

    pub fn cve_id(&self) -> Option<String> {
        self.cve.as_ref().map(|cve| format!("CVE-{}", cve))
    }

    pub fn osvdb_id(&self) -> Option<String> {
        self.osvdb.as_ref().map(|id| format!("OSVDB-{}", id))
    }

    pub fn ghsa_id(&self) -> Option<String> {
        self.ghsa.as_ref().map(|id| format!("GHSA-{}", id))
    }

    /// Normalized identifiers in CVE, OSVDB, GHSA order.
    pub fn identifiers(&self) -> Vec<String> {
        [self.cve_id(), self.osvdb_id(), self.ghsa_id()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// The identifier shown to users: the first normalized identifier, or
    /// the record id when the advisory has none.
    pub fn primary_identifier(&self) -> String {
        self.identifiers()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.id.clone())
    }

    /// Accepts normalized identifiers, the raw `cve` value and the record id.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        identifier == self.id
            || self.cve.as_deref() == Some(identifier)
            || self.identifiers().iter().any(|id| id == identifier)
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn cvss_v2(&self) -> Option<f64> {
        self.cvss_v2
    }

    pub fn cvss_v3(&self) -> Option<f64> {
        self.cvss_v3
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    pub fn patched_versions(&self) -> &[RequirementSet] {
        &self.patched_versions
    }

    pub fn unaffected_versions(&self) -> &[RequirementSet] {
        &self.unaffected_versions
    }

    pub fn is_patched(&self, version: &Version) -> bool {
        self.patched_versions
            .iter()
            .any(|req| req.satisfied_by(version))
    }

    pub fn is_unaffected(&self, version: &Version) -> bool {
        self.unaffected_versions
            .iter()
            .any(|req| req.satisfied_by(version))
    }

    /// Vulnerable unless some unaffected or patched range matches. With both
    /// lists empty every version is vulnerable.
    pub fn is_vulnerable(&self, version: &Version) -> bool {
        !self.is_unaffected(version) && !self.is_patched(version)
    }

    /// Treats `requirement` as patched for this advisory value only.
    pub fn add_patched_version(&mut self, requirement: &str) -> Result<()> {
        let requirement = RequirementSet::parse(requirement)?;
        self.add_patched_requirement(requirement);
        Ok(())
    }

    pub(crate) fn add_patched_requirement(&mut self, requirement: RequirementSet) {
        if !self.patched_versions.contains(&requirement) {
            self.patched_versions.push(requirement);
        }
    }
}

fn parse_requirements(raw: Option<Vec<String>>) -> Result<Vec<RequirementSet>> {
    raw.unwrap_or_default()
        .iter()
        .map(|s| RequirementSet::parse(s))
        .collect()
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.primary_identifier(), self.gem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ACTIONPACK: &str = r#"---
gem: actionpack
cve: 2013-0156
osvdb: 89026
url: http://osvdb.org/show/osvdb/89026
title: Ruby on Rails params_parser.rb Action Pack Type Casting Parameter Parsing Remote Code Execution
date: 2013-01-08
description: |
  Ruby on Rails contains a flaw in params_parser.rb of the Action Pack.
cvss_v2: 10.0
patched_versions:
  - ~> 2.3.15
  - ~> 3.0.19
  - ~> 3.1.10
  - ">= 3.2.11"
"#;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn actionpack() -> Advisory {
        Advisory::from_yaml("OSVDB-89026", ACTIONPACK).unwrap()
    }

    #[test]
    fn test_from_yaml_fields() {
        let advisory = actionpack();

        assert_eq!(advisory.id(), "OSVDB-89026");
        assert_eq!(advisory.gem(), "actionpack");
        assert_eq!(advisory.cve(), Some("2013-0156"));
        assert_eq!(advisory.url(), Some("http://osvdb.org/show/osvdb/89026"));
        assert_eq!(advisory.date(), NaiveDate::from_ymd_opt(2013, 1, 8));
        assert_eq!(advisory.criticality(), Criticality::High);
        assert_eq!(advisory.patched_versions().len(), 4);
        assert!(advisory.unaffected_versions().is_empty());
        assert!(advisory.description().unwrap().contains("params_parser.rb"));
    }

    #[test]
    fn test_identifiers() {
        let advisory = actionpack();

        assert_eq!(
            advisory.identifiers(),
            vec!["CVE-2013-0156".to_string(), "OSVDB-89026".to_string()]
        );
        assert_eq!(advisory.primary_identifier(), "CVE-2013-0156");
        assert!(advisory.matches_identifier("CVE-2013-0156"));
        assert!(advisory.matches_identifier("2013-0156"));
        assert!(advisory.matches_identifier("OSVDB-89026"));
        assert!(!advisory.matches_identifier("CVE-2013-0155"));
    }

    #[test]
    fn test_ghsa_identifier() {
        let advisory = Advisory::from_yaml(
            "GHSA-xxxx-yyyy-zzzz",
            "gem: rack\nghsa: xxxx-yyyy-zzzz\npatched_versions: ['>= 2.2.3']\n",
        )
        .unwrap();

        assert_eq!(advisory.identifiers(), vec!["GHSA-xxxx-yyyy-zzzz".to_string()]);
        assert!(advisory.matches_identifier("GHSA-xxxx-yyyy-zzzz"));
        assert_eq!(advisory.criticality(), Criticality::Unknown);
    }

    #[test]
    fn test_advisory_without_identifiers_uses_id() {
        let advisory = Advisory::from_yaml("RUBYSEC-1", "gem: foo\n").unwrap();

        assert!(advisory.identifiers().is_empty());
        assert_eq!(advisory.primary_identifier(), "RUBYSEC-1");
        assert!(advisory.matches_identifier("RUBYSEC-1"));
    }

    #[test]
    fn test_vulnerable_predicate() {
        let advisory = actionpack();

        assert!(advisory.is_vulnerable(&v("3.2.10")));
        assert!(!advisory.is_vulnerable(&v("3.2.11")));
        assert!(!advisory.is_vulnerable(&v("3.1.10")));
        assert!(advisory.is_vulnerable(&v("3.1.9")));
        assert!(!advisory.is_vulnerable(&v("2.3.18")));
        assert!(advisory.is_vulnerable(&v("2.2.0")));
    }

    #[test]
    fn test_single_pessimistic_patch() {
        let advisory =
            Advisory::from_yaml("CVE-X", "gem: rails\npatched_versions: ['~> 3.2.11']\n").unwrap();

        assert!(advisory.is_vulnerable(&v("3.2.10")));
        assert!(!advisory.is_vulnerable(&v("3.2.11")));
        assert!(advisory.is_vulnerable(&v("3.3.0")));
    }

    #[test]
    fn test_unaffected_versions() {
        let advisory = Advisory::from_yaml(
            "CVE-Y",
            "gem: json\nunaffected_versions: ['< 1.1.0']\npatched_versions: ['>= 1.7.7']\n",
        )
        .unwrap();

        assert!(!advisory.is_vulnerable(&v("1.0.9")));
        assert!(advisory.is_vulnerable(&v("1.5.0")));
        assert!(!advisory.is_vulnerable(&v("1.7.7")));
    }

    #[test]
    fn test_no_known_fix_is_always_vulnerable() {
        let advisory = Advisory::from_yaml("CVE-Z", "gem: abandoned\n").unwrap();

        assert!(advisory.is_vulnerable(&v("0.0.1")));
        assert!(advisory.is_vulnerable(&v("99.0")));

        let explicit =
            Advisory::from_yaml("CVE-Z", "gem: abandoned\npatched_versions: []\n").unwrap();
        assert!(explicit.is_vulnerable(&v("1.0")));
    }

    #[test]
    fn test_add_patched_version_is_idempotent() {
        let mut once = actionpack();
        once.add_patched_version("= 3.2.10").unwrap();

        let mut twice = actionpack();
        twice.add_patched_version("= 3.2.10").unwrap();
        twice.add_patched_version("= 3.2.10").unwrap();

        assert_eq!(once.patched_versions().len(), twice.patched_versions().len());
        for s in ["3.2.9", "3.2.10", "3.2.11", "3.1.0"] {
            assert_eq!(once.is_vulnerable(&v(s)), twice.is_vulnerable(&v(s)));
        }
        assert!(!once.is_vulnerable(&v("3.2.10")));
        assert!(once.is_vulnerable(&v("3.2.9")));
    }

    #[test]
    fn test_add_patched_version_does_not_touch_clones() {
        let original = actionpack();
        let mut overridden = original.clone();
        overridden.add_patched_version("3.2.10").unwrap();

        assert!(original.is_vulnerable(&v("3.2.10")));
        assert!(!overridden.is_vulnerable(&v("3.2.10")));
    }

    #[test]
    fn test_add_patched_version_rejects_garbage() {
        let mut advisory = actionpack();
        assert!(advisory.add_patched_version("").is_err());
        assert_eq!(advisory.patched_versions().len(), 4);
    }

    #[test]
    fn test_criticality_scales() {
        assert_eq!(Criticality::from_cvss(Some(2.6), None), Criticality::Low);
        assert_eq!(Criticality::from_cvss(Some(5.0), None), Criticality::Medium);
        assert_eq!(Criticality::from_cvss(Some(7.5), None), Criticality::High);
        assert_eq!(Criticality::from_cvss(Some(9.0), Some(3.1)), Criticality::Low);
        assert_eq!(Criticality::from_cvss(None, Some(9.8)), Criticality::High);
        assert_eq!(Criticality::from_cvss(None, None), Criticality::Unknown);
        assert_eq!(Criticality::from_cvss(Some(11.0), None), Criticality::Unknown);
    }

    #[test]
    fn test_load_uses_file_stem() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("CVE-2013-0156.yml");
        fs::write(&path, ACTIONPACK).unwrap();

        let advisory = Advisory::load(&path).unwrap();
        assert_eq!(advisory.id(), "CVE-2013-0156");
    }

    #[test]
    fn test_load_malformed_record() {
        let temp_dir = TempDir::new().unwrap();

        let missing_gem = temp_dir.path().join("missing.yml");
        fs::write(&missing_gem, "cve: 2020-0001\n").unwrap();
        assert!(matches!(
            Advisory::load(&missing_gem),
            Err(GemauditError::InvalidAdvisory { .. })
        ));

        let bad_range = temp_dir.path().join("bad.yml");
        fs::write(&bad_range, "gem: foo\npatched_versions: ['>=']\n").unwrap();
        assert!(matches!(
            Advisory::load(&bad_range),
            Err(GemauditError::InvalidAdvisory { .. })
        ));
    }

    #[test]
    fn test_range_missing_comma_is_rejected() {
        let yaml = "gem: foo\npatched_versions:\n  - '>= 1.2 < 2.0'\n";
        assert!(matches!(
            Advisory::from_yaml("CVE-2020-0002", yaml),
            Err(GemauditError::InvalidAdvisory { .. })
        ));

        let yaml = "gem: foo\nunaffected_versions:\n  - '=> 1.0'\n";
        assert!(Advisory::from_yaml("CVE-2020-0003", yaml).is_err());
    }
}
