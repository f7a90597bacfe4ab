//! Archive storage and record source configuration types.

use std::path::PathBuf;

use serde::Deserialize;

use crate::source::DEFAULT_CHANNEL_CAPACITY;

/// Archive storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for persisted batches.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./archive"),
        }
    }
}

/// Record source configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// JSON-lines input file. `-` reads standard input.
    pub path: String,
    /// Capacity of the record channel between producer and archiving loop.
    pub channel_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: "-".to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SourceConfig {
    pub fn is_stdin(&self) -> bool {
        self.path == "-"
    }
}
