use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GemauditError {
    #[error("Cannot parse '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("Invalid advisory database '{}': {reason}", .path.display())]
    InvalidDatabase { path: PathBuf, reason: String },

    #[error("Invalid advisory record {}: {reason}", .path.display())]
    InvalidAdvisory { path: PathBuf, reason: String },

    #[error("Invalid safe-version override '{value}': {reason}")]
    InvalidOverride { value: String, reason: String },

    #[error("Invalid YAML syntax in {}:{line}:{column}: {message}", .file.display())]
    YamlSyntaxError {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Malformed lockfile {}:{line}: {message}", .file.display())]
    Lockfile {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Lockfile not found: {}", .0.display())]
    LockfileNotFound(PathBuf),

    #[error("Plugin error: {message}")]
    Plugin { message: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl GemauditError {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        GemauditError::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GemauditError>;
