use gemaudit_core::error::{GemauditError, Result};
use gemaudit_core::plugin::Detector;
use gemaudit_core::types::DependencyFile;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_LOCKFILE: &str = "Gemfile.lock";

#[derive(Debug, Default)]
pub struct BundlerDetector;

impl BundlerDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for BundlerDetector {
    fn name(&self) -> &'static str {
        super::plugin::PLUGIN_NAME
    }

    fn lockfile_name(&self) -> &'static str {
        DEFAULT_LOCKFILE
    }

    fn detect(&self, root: &Path, lockfile: Option<&str>) -> Result<DependencyFile> {
        let path = root.join(lockfile.unwrap_or(DEFAULT_LOCKFILE));
        debug!(path = %path.display(), "looking for lockfile");

        if !path.is_file() {
            return Err(GemauditError::LockfileNotFound(path));
        }

        let content = fs::read_to_string(&path)?;
        Ok(DependencyFile { path, content })
    }
}
