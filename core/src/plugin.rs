use crate::error::{GemauditError, Result};
use crate::types::{DependencyFile, Lockfile};
use std::path::Path;
use tracing::debug;

pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Default lockfile name searched for under the project root.
    fn lockfile_name(&self) -> &'static str;

    /// Locate and read `lockfile` (or the default name) under `root`.
    fn detect(&self, root: &Path, lockfile: Option<&str>) -> Result<DependencyFile>;
}

pub trait Parser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, file: &DependencyFile) -> Result<Lockfile>;
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn create_detector(&self) -> Option<Box<dyn Detector>> {
        None
    }
    fn create_parser(&self) -> Option<Box<dyn Parser>> {
        None
    }
}

pub struct PluginRegistry {
    detectors: Vec<Box<dyn Detector>>,
    parsers: Vec<Box<dyn Parser>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
            parsers: Vec::new(),
        }
    }

    pub fn register_detector(&mut self, detector: Box<dyn Detector>) {
        self.detectors.push(detector);
    }

    pub fn register_parser(&mut self, parser: Box<dyn Parser>) {
        self.parsers.push(parser);
    }

    pub fn register_plugin<P: Plugin + 'static>(&mut self, plugin: P) {
        debug!(plugin = plugin.name(), "registering plugin");
        if let Some(detector) = plugin.create_detector() {
            self.register_detector(detector);
        }
        if let Some(parser) = plugin.create_parser() {
            self.register_parser(parser);
        }
    }

    pub fn get_detector(&self, name: &str) -> Option<&dyn Detector> {
        self.detectors
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.as_ref())
    }

    pub fn get_parser(&self, name: &str) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run the first detector that finds a lockfile, then its matching parser.
    pub fn load_lockfile(&self, root: &Path, lockfile: Option<&str>) -> Result<Lockfile> {
        let mut last_error = None;

        for detector in &self.detectors {
            match detector.detect(root, lockfile) {
                Ok(file) => {
                    debug!(detector = detector.name(), path = %file.path.display(), "found lockfile");
                    let parser = self.get_parser(detector.name()).ok_or_else(|| {
                        GemauditError::Plugin {
                            message: format!("no parser registered for {}", detector.name()),
                        }
                    })?;
                    return parser.parse(&file);
                }
                Err(e @ GemauditError::LockfileNotFound(_)) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| GemauditError::Plugin {
            message: "no lockfile detectors registered".to_string(),
        }))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
