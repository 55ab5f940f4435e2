//! YAML configuration: store targets, the databases allowed on each, and
//! the logging profile.

use crate::errors::{ExError, ExErrorKind};
use crate::logging_facility::Profile;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_AUTHOR: &str = "changegate <changegate@localhost>";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ExError {
    fn from(err: ConfigError) -> Self {
        ExError::new(ExErrorKind::Internal)
            .with_op("load_config")
            .with_message(err.to_string())
    }
}

/// One store instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetConfig {
    pub id: String,
    /// Directory holding one `<database>.db` file per database
    pub root: PathBuf,
    /// Author recorded on commits made through this target
    #[serde(default)]
    pub author: Option<String>,
}

impl TargetConfig {
    pub fn author(&self) -> &str {
        self.author.as_deref().unwrap_or(DEFAULT_AUTHOR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub target_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for target in &self.targets {
            if !ids.insert(target.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate target id '{}'",
                    target.id
                )));
            }
        }
        for db in &self.databases {
            if !ids.contains(db.target_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "database '{}' references unknown target '{}'",
                    db.name, db.target_id
                )));
            }
            crate::validation::validate_identifier("database name", &db.name)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    pub fn find_target(&self, id: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Databases configured for one target, in file order
    pub fn databases_for(&self, target_id: &str) -> Vec<&DatabaseConfig> {
        self.databases
            .iter()
            .filter(|d| d.target_id == target_id)
            .collect()
    }

    pub fn is_allowed(&self, target_id: &str, database: &str) -> bool {
        self.databases
            .iter()
            .any(|d| d.target_id == target_id && d.name == database)
    }
}
