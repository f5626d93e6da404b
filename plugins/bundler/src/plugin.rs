use super::detector::BundlerDetector;
use super::parser::GemfileLockParser;
use gemaudit_core::plugin::{Detector, Parser, Plugin};

pub const PLUGIN_NAME: &str = "bundler";

#[derive(Debug, Default)]
pub struct BundlerPlugin;

impl BundlerPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for BundlerPlugin {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn create_detector(&self) -> Option<Box<dyn Detector>> {
        Some(Box::new(BundlerDetector::new()))
    }

    fn create_parser(&self) -> Option<Box<dyn Parser>> {
        Some(Box::new(GemfileLockParser::new()))
    }
}
