use serde::Serialize;
use std::path::PathBuf;

use super::source::Source;
use crate::version::Version;

/// A lockfile found on disk, not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyFile {
    pub path: PathBuf,
    pub content: String,
}

/// A resolved dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dependency {
    pub name: String,
    pub version: Version,
    /// `None` for dependencies vendored from a local path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            source: None,
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }
}

/// The parsed contents of a lockfile: resolved dependencies and every
/// declared source, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lockfile {
    pub dependencies: Vec<Dependency>,
    pub sources: Vec<Source>,
}
