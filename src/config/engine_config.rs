use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{executor::{Check, ExecutorConfig}, planner::{CostModel, ResourceConstraints}};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode config: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Every tunable of the engine. Each section falls back to its defaults
/// when absent from the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub resources: ResourceConstraints,
    pub cost: CostModel,
    pub executor: ExecutorConfig,
    pub checks: Vec<Check>,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        debug!(path = %path.display(), "config loaded");
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resources.max_concurrent_groups == 0 {
            return Err(ConfigError::Invalid("max_concurrent_groups must be at least 1".to_string()));
        }
        if self.resources.memory_budget_bytes == 0 {
            return Err(ConfigError::Invalid("memory_budget_bytes must be positive".to_string()));
        }
        if !(1..=100).contains(&self.resources.memory_pressure_threshold_percent) {
            return Err(ConfigError::Invalid(format!(
                "memory_pressure_threshold_percent must be within 1..=100, got {}",
                self.resources.memory_pressure_threshold_percent
            )));
        }
        if self.executor.poll_interval_millis == 0 {
            return Err(ConfigError::Invalid("poll_interval_millis must be positive".to_string()));
        }
        for check in self.checks.iter() {
            if check.warn_ratio > check.pass_ratio {
                return Err(ConfigError::Invalid(format!("check {} warns above its pass ratio", check.id)));
            }
        }
        Ok(())
    }
}
