use crate::database::SafeVersion;
use crate::error::{GemauditError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const CONFIG_FILE: &str = ".gemaudit.yml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ignore: Vec<String>,
    pub consider_git_uris_safe: bool,
    pub safe_versions: Vec<String>,
}

impl Config {
    /// Load `.gemaudit.yml` from `project_root`. A missing file yields the
    /// default configuration.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE);
        if !path.is_file() {
            debug!(path = %path.display(), "no configuration file");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Self::from_yaml(&path, &content)
    }

    pub fn from_yaml(file: &Path, content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| {
            let (line, column) = e
                .location()
                .map(|l| (l.line(), l.column()))
                .unwrap_or((0, 0));
            GemauditError::YamlSyntaxError {
                file: file.to_path_buf(),
                line,
                column,
                message: e.to_string(),
            }
        })?;

        let config = match value {
            serde_yaml::Value::Null => Self::default(),
            serde_yaml::Value::Mapping(_) => {
                serde_yaml::from_value(value).map_err(|e| GemauditError::InvalidConfig {
                    message: format!("{}: {}", file.display(), e),
                })?
            }
            _ => {
                return Err(GemauditError::InvalidConfig {
                    message: format!("{}: expected a mapping at the top level", file.display()),
                })
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.ignore.iter().any(|id| id.trim().is_empty()) {
            return Err(GemauditError::InvalidConfig {
                message: "'ignore' entries must be non-empty advisory identifiers".to_string(),
            });
        }

        for value in &self.safe_versions {
            SafeVersion::parse(value).map_err(|e| GemauditError::InvalidConfig {
                message: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Fold command-line settings into the file settings.
    pub fn merge<I, S>(mut self, ignore: I, safe_versions: I, consider_git_uris_safe: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.ignore, ignore);
        extend_unique(&mut self.safe_versions, safe_versions);
        self.consider_git_uris_safe |= consider_git_uris_safe;
        self
    }
}

fn extend_unique<I, S>(target: &mut Vec<String>, values: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for value in values {
        let value = value.into();
        if !target.contains(&value) {
            target.push(value);
        }
    }
}
