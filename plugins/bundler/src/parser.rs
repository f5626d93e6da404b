//! `Gemfile.lock` parsing.
//!
//! Only the source sections matter for auditing:
//!
//! ```text
//! GIT
//!   remote: git://github.com/rails/jquery-rails.git
//!   revision: 3e4aa9b4
//!   branch: master
//!   specs:
//!     jquery-rails (2.2.1)
//!       railties (>= 3.0, < 5.0)
//!
//! GEM
//!   remote: https://rubygems.org/
//!   specs:
//!     nokogiri (1.14.0-x86_64-linux)
//! ```
//!
//! Resolved gems sit at four spaces of indentation. Their own requirements
//! (six spaces) are not resolved versions and are skipped.

use gemaudit_core::error::{GemauditError, Result};
use gemaudit_core::plugin::Parser;
use gemaudit_core::types::{Dependency, DependencyFile, Lockfile, Source};
use gemaudit_core::version::Version;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

static RE_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {2}([a-z_]+):(?:\s+(.*))?$").unwrap());

static RE_SPEC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {4}([A-Za-z0-9_\-\.]+) \(([^)]+)\)\s*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Gem,
    Git,
    Path,
}

impl SectionKind {
    fn from_header(header: &str) -> Option<Self> {
        match header {
            "GEM" => Some(SectionKind::Gem),
            "GIT" => Some(SectionKind::Git),
            "PATH" => Some(SectionKind::Path),
            _ => None,
        }
    }
}

/// A source section while its attributes are being read.
#[derive(Debug)]
struct Section {
    kind: SectionKind,
    header_line: usize,
    remotes: Vec<String>,
    revision: Option<String>,
    reference: Option<String>,
    in_specs: bool,
    source: Option<Source>,
    finished: bool,
}

impl Section {
    fn new(kind: SectionKind, header_line: usize) -> Self {
        Self {
            kind,
            header_line,
            remotes: Vec::new(),
            revision: None,
            reference: None,
            in_specs: false,
            source: None,
            finished: false,
        }
    }

    /// Emit the section's sources once its attributes are complete.
    fn finish(&mut self, file: &Path, sources: &mut Vec<Source>) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        match self.kind {
            SectionKind::Gem => {
                let registries: Vec<Source> =
                    self.remotes.iter().map(|r| Source::registry(r.as_str())).collect();
                self.source = registries.first().cloned();
                sources.extend(registries);
            }
            SectionKind::Git => {
                let remote = self.remotes.first().ok_or_else(|| GemauditError::Lockfile {
                    file: file.to_path_buf(),
                    line: self.header_line,
                    message: "GIT section without a remote".to_string(),
                })?;
                let mut source = Source::git(remote.as_str());
                if let Some(reference) = self.reference.as_ref().or(self.revision.as_ref()) {
                    source = source.with_reference(reference.as_str());
                }
                self.source = Some(source.clone());
                sources.push(source);
            }
            SectionKind::Path => {}
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct GemfileLockParser;

impl GemfileLockParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_content(&self, file: &Path, content: &str) -> Result<Lockfile> {
        let mut lockfile = Lockfile::default();
        let mut section: Option<Section> = None;

        for (index, raw_line) in content.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim_end_matches('\r');

            if line.trim().is_empty() {
                if let Some(mut current) = section.take() {
                    current.finish(file, &mut lockfile.sources)?;
                }
                continue;
            }

            if !line.starts_with(' ') {
                if let Some(mut current) = section.take() {
                    current.finish(file, &mut lockfile.sources)?;
                }
                section = SectionKind::from_header(line.trim())
                    .map(|kind| Section::new(kind, line_number));
                continue;
            }

            let Some(current) = section.as_mut() else {
                continue;
            };

            if current.in_specs {
                if let Some(caps) = RE_SPEC_LINE.captures(line) {
                    let dependency = parse_spec(file, line_number, &caps[1], &caps[2])?;
                    let dependency = match &current.source {
                        Some(source) => dependency.with_source(source.clone()),
                        None => dependency,
                    };
                    lockfile.dependencies.push(dependency);
                    continue;
                }
                if line.starts_with("      ") {
                    continue;
                }
            }

            if let Some(caps) = RE_ATTRIBUTE.captures(line) {
                let value = caps.get(2).map(|m| m.as_str().trim().to_string());
                match (&caps[1], value) {
                    ("specs", _) => {
                        current.finish(file, &mut lockfile.sources)?;
                        current.in_specs = true;
                    }
                    ("remote", Some(remote)) => current.remotes.push(remote),
                    ("revision", Some(revision)) => current.revision = Some(revision),
                    ("branch" | "ref" | "tag", Some(reference)) => {
                        current.reference = Some(reference)
                    }
                    _ => {}
                }
                continue;
            }

            return Err(GemauditError::Lockfile {
                file: file.to_path_buf(),
                line: line_number,
                message: format!("unexpected line '{}'", line.trim()),
            });
        }

        if let Some(mut current) = section.take() {
            current.finish(file, &mut lockfile.sources)?;
        }

        debug!(
            file = %file.display(),
            dependencies = lockfile.dependencies.len(),
            sources = lockfile.sources.len(),
            "parsed lockfile"
        );

        Ok(lockfile)
    }
}

impl Parser for GemfileLockParser {
    fn name(&self) -> &'static str {
        super::plugin::PLUGIN_NAME
    }

    fn parse(&self, file: &DependencyFile) -> Result<Lockfile> {
        self.parse_content(&file.path, &file.content)
    }
}

/// `nokogiri (1.14.0-x86_64-linux)` resolves to version `1.14.0`.
fn parse_spec(file: &Path, line: usize, name: &str, raw_version: &str) -> Result<Dependency> {
    let version = raw_version
        .split_once('-')
        .map_or(raw_version, |(version, _platform)| version);

    let version = Version::parse(version).map_err(|e| GemauditError::Lockfile {
        file: file.to_path_buf(),
        line,
        message: e.to_string(),
    })?;

    Ok(Dependency::new(name, version))
}
