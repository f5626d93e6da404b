//! Gemaudit Core Library
//!
//! Advisory database, version matching and scanning for Ruby lockfiles.

pub mod advisory;
pub mod config;
pub mod database;
pub mod error;
pub mod plugin;
pub mod report;
pub mod requirement;
pub mod resolver;
pub mod scanner;
pub mod types;
pub mod version;

pub use advisory::{Advisory, Criticality};
pub use config::Config;
pub use database::{Database, SafeVersion};
pub use error::{GemauditError, Result};
pub use plugin::{Detector, Parser, Plugin, PluginRegistry};
pub use report::{Report, ReportSummary, ScanResult};
pub use requirement::{Constraint, Operator, RequirementSet};
pub use resolver::{HostResolver, SystemResolver};
pub use scanner::Scanner;
pub use types::*;
pub use version::Version;
