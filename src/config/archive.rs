//! Archiving loop configuration.

use std::time::Duration;

use backon::ExponentialBuilder;
use serde::Deserialize;

use super::ConfigError;

/// Default size threshold that triggers a flush (16 MiB).
pub const DEFAULT_SIZE_THRESHOLD_BYTES: usize = 16 * 1024 * 1024;

/// Default flush timeout in seconds.
pub const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 60;

/// Archiving loop configuration. Read once when a session starts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Flush as soon as the buffered batch reaches this many bytes.
    pub size_threshold_bytes: usize,

    /// Flush a non-empty batch after this many seconds without a flush.
    pub flush_timeout_secs: u64,

    /// Maximum size of a single record payload. 0 disables the check.
    pub max_record_bytes: usize,

    /// Retry policy for failed batch persists.
    pub persist_retry: RetryConfig,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD_BYTES,
            flush_timeout_secs: DEFAULT_FLUSH_TIMEOUT_SECS,
            max_record_bytes: 0,
            persist_retry: RetryConfig::default(),
        }
    }
}

impl ArchiveConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }

    /// Reject values the archiving loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size_threshold_bytes == 0 {
            return Err(ConfigError::Invalid(
                "archive.size_threshold_bytes must be positive".to_string(),
            ));
        }
        if self.flush_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "archive.flush_timeout_secs must be positive".to_string(),
            ));
        }
        self.persist_retry.validate("archive.persist_retry")
    }
}

/// Exponential backoff policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. 0 fails immediately.
    pub max_retries: usize,
    /// Delay before the first retry, in milliseconds.
    pub min_delay_ms: u64,
    /// Upper bound for any delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Backoff builder with jitter for this policy.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.min_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    pub(crate) fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "{field}: min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}
