//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

use serde::Deserialize;
use thiserror::Error;

mod archive;
mod storage;
mod supervisor;

pub use archive::{
    ArchiveConfig, RetryConfig, DEFAULT_FLUSH_TIMEOUT_SECS, DEFAULT_SIZE_THRESHOLD_BYTES,
};
pub use storage::{SourceConfig, StorageConfig};
pub use supervisor::SupervisorConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ARKIV_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ARKIV";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ARKIV_LOG";

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Archiving loop thresholds and persist retry policy.
    pub archive: ArchiveConfig,
    /// Record source configuration.
    pub source: SourceConfig,
    /// Archive storage configuration.
    pub storage: StorageConfig,
    /// Session restart policy.
    pub supervisor: SupervisorConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config: Config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.archive.validate()?;
        if self.source.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "source.channel_capacity must be positive".to_string(),
            ));
        }
        self.supervisor
            .restart_backoff
            .validate("supervisor.restart_backoff")
    }
}
