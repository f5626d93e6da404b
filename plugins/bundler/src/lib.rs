pub mod detector;
pub mod parser;
pub mod plugin;

pub use detector::BundlerDetector;
pub use parser::GemfileLockParser;
pub use plugin::BundlerPlugin;
