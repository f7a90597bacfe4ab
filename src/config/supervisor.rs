//! Session supervisor configuration.

use serde::Deserialize;

use super::RetryConfig;

/// Controls how failed archiving sessions are restarted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Consecutive restarts allowed before a retryable fault is escalated.
    pub max_restarts: usize,
    /// Start a new session when the source ends its stream.
    pub restart_on_end_of_stream: bool,
    /// Delay between restarts.
    pub restart_backoff: RetryConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 10,
            restart_on_end_of_stream: false,
            restart_backoff: RetryConfig {
                max_retries: usize::MAX,
                min_delay_ms: 500,
                max_delay_ms: 30_000,
            },
        }
    }
}
