//! Session supervisor.
//!
//! Runs archiving sessions back to back. Retryable faults start a fresh
//! session from the last durable position after a backoff delay; continuity
//! and validation faults are escalated to the caller immediately. A source
//! that cannot replay gets exactly one session: restarting it would skip the
//! records the failed session had buffered.

use backon::BackoffBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::archiver::{ArchiveError, ArchiveSummary, Archiver, Termination};
use crate::config::SupervisorConfig;

/// Restarts failed archiving sessions according to a [`SupervisorConfig`].
pub struct Supervisor {
    archiver: Archiver,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(archiver: Archiver, config: SupervisorConfig) -> Self {
        Self { archiver, config }
    }

    /// Run sessions until one ends cleanly, the caller cancels, or a fault
    /// is escalated.
    pub async fn run(&self, cancel: CancellationToken) -> Result<ArchiveSummary, ArchiveError> {
        let mut backoff = self.config.restart_backoff.backoff().build();
        let mut restarts = 0usize;

        loop {
            let persisted_before = self.archiver.persisted_batches();
            let outcome = self.archiver.run(cancel.clone()).await;

            if self.archiver.persisted_batches() > persisted_before {
                restarts = 0;
                backoff = self.config.restart_backoff.backoff().build();
            }

            let err = match outcome {
                Ok(summary) if summary.reason == Termination::Cancelled => return Ok(summary),
                Ok(summary) if !self.config.restart_on_end_of_stream => return Ok(summary),
                Ok(summary) if !self.archiver.source_replayable() => return Ok(summary),
                Ok(summary) => {
                    let delay = backoff.next().unwrap_or_default();
                    info!(
                        last_persisted = ?summary.last_persisted,
                        retry_in = ?delay,
                        "Record stream ended, starting a new session"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(summary),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!(kind = %err.kind(), error = %err, "Archiving halted, operator action required");
                return Err(err);
            }
            if !self.archiver.source_replayable() {
                error!(
                    kind = %err.kind(),
                    error = %err,
                    persisted_batches = self.archiver.persisted_batches(),
                    "Archiving halted, record source cannot replay unflushed records"
                );
                return Err(err);
            }
            if restarts >= self.config.max_restarts {
                error!(
                    kind = %err.kind(),
                    error = %err,
                    restarts,
                    "Archiving halted, restart limit reached"
                );
                return Err(err);
            }
            let Some(delay) = backoff.next() else {
                return Err(err);
            };
            restarts += 1;

            warn!(
                kind = %err.kind(),
                error = %err,
                attempt = restarts,
                max_restarts = self.config.max_restarts,
                retry_in = ?delay,
                "Archiving session failed, restarting from last persisted position"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(err),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
