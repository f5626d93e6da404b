pub mod dependency;
pub mod source;

pub use dependency::{Dependency, DependencyFile, Lockfile};
pub use source::{Source, SourceKind};
