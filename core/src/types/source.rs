use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Git,
    Registry,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Git => write!(f, "git"),
            SourceKind::Registry => write!(f, "registry"),
        }
    }
}

/// Where a dependency is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Source {
    pub kind: SourceKind,
    pub uri: String,
    /// Branch, tag or ref of a git source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Source {
    pub fn git(uri: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Git,
            uri: uri.into(),
            reference: None,
        }
    }

    pub fn registry(uri: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Registry,
            uri: uri.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{} {} ({})", self.kind, self.uri, reference),
            None => write!(f, "{} {}", self.kind, self.uri),
        }
    }
}
