use anyhow::{Context, Result};
use gemaudit_core::{Database, Lockfile, PluginRegistry};
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(feature = "bundler")]
use gemaudit_plugin_bundler::BundlerPlugin;

pub fn build_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();

    #[cfg(feature = "bundler")]
    {
        registry.register_plugin(BundlerPlugin::new());
    }

    registry
}

pub fn load_lockfile(dir: &Path, name: &str) -> Result<Lockfile> {
    let registry = build_registry();
    let lockfile = registry
        .load_lockfile(dir, Some(name))
        .with_context(|| format!("loading {} from {}", name, dir.display()))?;
    Ok(lockfile)
}

/// `explicit` comes from `--database` or `GEMAUDIT_DATABASE`; otherwise the
/// gems directory of a ruby-advisory-db checkout under the user data dir.
pub fn database_path(explicit: Option<&Path>, data_dir: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| data_dir.map(|dir| dir.join("ruby-advisory-db").join("gems")))
}

pub fn open_database(explicit: Option<&Path>, safe_versions: &[String]) -> Result<Database> {
    let path = database_path(explicit, dirs::data_dir())
        .context("no advisory database configured; pass --database or set GEMAUDIT_DATABASE")?;
    debug!(path = %path.display(), "opening advisory database");

    let database = Database::open(&path)?.with_safe_versions(safe_versions)?;
    Ok(database)
}
