//! Continuous archiving loop.
//!
//! An [`Archiver`] session resumes from the archive store's last persisted
//! position, opens a record stream there, and folds incoming records into a
//! batch. The batch is flushed to the store when it reaches the size
//! threshold or when the flush timer elapses with data buffered.
//!
//! ```text
//! resume_position() --> stream_from(pos) --> [record | timer] --> persist_batch()
//!                                              ^                      |
//!                                              +----------------------+
//! ```
//!
//! Every fault ends the session with a typed [`ArchiveError`]; nothing here
//! terminates the process. Unflushed data is discarded and fetched again by
//! the next session, which resumes from the last durable position.

mod batch;
mod error;

pub use batch::BatchAccumulator;
pub use error::{ArchiveError, FaultKind};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveStore, ArchiveStoreError, BatchKey, ResumeState};
use crate::config::ArchiveConfig;
use crate::position::Position;
use crate::source::{RecordResult, RecordSource, RecordStream};
use crate::validation::RecordValidator;

/// Why a flush was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    SizeThreshold,
    TimeoutElapsed,
}

/// How a session ended without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The source closed its stream.
    EndOfStream,
    /// The caller cancelled the session.
    Cancelled,
}

/// Result of a session that ended without a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub resumed_from: ResumeState,
    pub batches: usize,
    pub bytes: usize,
    pub last_persisted: Option<Position>,
    pub reason: Termination,
}

/// Outcome of one loop iteration, before the timer is rearmed.
enum Step {
    /// Record buffered; the pending timer keeps running.
    Buffered,
    /// Timer elapsed with nothing buffered.
    Idle,
    Flush(FlushTrigger),
}

/// Drives archiving sessions against a source, a validator and a store.
pub struct Archiver {
    store: Arc<dyn ArchiveStore>,
    source: Arc<dyn RecordSource>,
    validator: Arc<dyn RecordValidator>,
    config: ArchiveConfig,
    persisted_batches: AtomicUsize,
}

impl Archiver {
    pub fn new(
        store: Arc<dyn ArchiveStore>,
        source: Arc<dyn RecordSource>,
        validator: Arc<dyn RecordValidator>,
        config: ArchiveConfig,
    ) -> Self {
        Self {
            store,
            source,
            validator,
            config,
            persisted_batches: AtomicUsize::new(0),
        }
    }

    /// Whether a new session can re-read unflushed records.
    pub fn source_replayable(&self) -> bool {
        self.source.replayable()
    }

    /// Batches persisted by this archiver across all sessions.
    pub fn persisted_batches(&self) -> usize {
        self.persisted_batches.load(Ordering::SeqCst)
    }

    /// Run one archiving session until the stream ends, `cancel` fires, or a
    /// fault occurs.
    ///
    /// Returns only after the source's background worker has exited.
    #[tracing::instrument(name = "archiver.session", skip_all)]
    pub async fn run(&self, cancel: CancellationToken) -> Result<ArchiveSummary, ArchiveError> {
        let resume = self
            .store
            .resume_position()
            .await
            .map_err(ArchiveError::Resume)?;

        if resume.is_initial {
            info!("Initiating archiving first run");
        }
        info!(
            from = %resume.position,
            initial = resume.is_initial,
            "Starting archiving from last known position"
        );

        let worker_cancel = cancel.child_token();
        let RecordStream { records, worker } = self
            .source
            .stream_from(worker_cancel.clone(), resume.position)
            .await
            .map_err(ArchiveError::OpenStream)?;

        let mut session = Session::new(self, resume);
        let result = session.drive(records, &cancel).await;

        // The receiver is gone; stop the producer and wait for it.
        worker_cancel.cancel();
        if let Err(e) = worker.await {
            warn!(error = %e, "Record source worker did not exit cleanly");
        }

        let reason = result?;
        info!(
            batches = session.batches,
            bytes = session.bytes,
            last_persisted = ?session.last_persisted,
            reason = ?reason,
            "Archiving session finished"
        );
        Ok(session.summary(reason))
    }
}

/// Mutable state of one session. Owned by the loop alone.
struct Session<'a> {
    archiver: &'a Archiver,
    resumed_from: ResumeState,
    batch: BatchAccumulator,
    /// Position the first record must sit at, on a resumed session.
    expect_first: Option<Position>,
    last_persisted: Option<Position>,
    batches: usize,
    bytes: usize,
}

impl<'a> Session<'a> {
    fn new(archiver: &'a Archiver, resume: ResumeState) -> Self {
        Self {
            archiver,
            resumed_from: resume,
            batch: BatchAccumulator::new(),
            expect_first: (!resume.is_initial).then_some(resume.position),
            last_persisted: (!resume.is_initial).then_some(resume.position),
            batches: 0,
            bytes: 0,
        }
    }

    async fn drive(
        &mut self,
        mut records: mpsc::Receiver<RecordResult>,
        cancel: &CancellationToken,
    ) -> Result<Termination, ArchiveError> {
        let timeout = self.archiver.config.flush_timeout();
        let timer = tokio::time::sleep(timeout);
        tokio::pin!(timer);

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(buffered = self.batch.size(), "Archiving cancelled");
                    return Ok(Termination::Cancelled);
                }
                _ = &mut timer => self.on_timeout(),
                item = records.recv() => match item {
                    Some(item) => self.on_record(item)?,
                    None => {
                        debug!(buffered = self.batch.size(), "Record stream closed");
                        return Ok(Termination::EndOfStream);
                    }
                },
            };

            match step {
                Step::Buffered => continue,
                Step::Idle => {}
                Step::Flush(trigger) => self.flush(trigger).await?,
            }

            // Single rearm site: one timer pending at all times.
            timer.as_mut().reset(Instant::now() + timeout);
        }
    }

    fn on_record(&mut self, item: RecordResult) -> Result<Step, ArchiveError> {
        let record = item.map_err(ArchiveError::Stream)?;

        if let Some(expected) = self.expect_first.take() {
            if record.position != expected {
                return Err(ArchiveError::Gap {
                    expected,
                    actual: record.position,
                });
            }
            // Already archived as the previous batch's end.
            debug!(position = %record.position, "Stream continues from last archived position");
            return Ok(Step::Buffered);
        }

        self.archiver
            .validator
            .validate(&record)
            .map_err(|source| ArchiveError::Validation {
                position: record.position,
                source,
            })?;

        self.batch.append(record.position, &record.payload);

        if self.batch.size() < self.archiver.config.size_threshold_bytes {
            return Ok(Step::Buffered);
        }
        debug!(size = self.batch.size(), "Initializing archive upload due to archive size");
        Ok(Step::Flush(FlushTrigger::SizeThreshold))
    }

    fn on_timeout(&self) -> Step {
        if self.batch.is_empty() {
            return Step::Idle;
        }
        debug!(size = self.batch.size(), "Initializing archive upload due to timeout expired");
        Step::Flush(FlushTrigger::TimeoutElapsed)
    }

    async fn flush(&mut self, trigger: FlushTrigger) -> Result<(), ArchiveError> {
        let Some(BatchKey { start, end }) = self.batch.bounds() else {
            return Ok(());
        };
        let payload = self.batch.payload();
        let store = &self.archiver.store;

        let persist = || store.persist_batch(payload, start, end);
        persist
            .retry(self.archiver.config.persist_retry.backoff())
            .when(|e| !matches!(e, ArchiveStoreError::InvalidBounds { .. }))
            .notify(|e: &ArchiveStoreError, delay: Duration| {
                warn!(
                    start = %start,
                    end = %end,
                    error = %e,
                    retry_in = ?delay,
                    "Batch persist failed, retrying"
                );
            })
            .await
            .map_err(|source| ArchiveError::Persist { start, end, source })?;

        info!(
            start = %start,
            end = %end,
            bytes = payload.len(),
            records = self.batch.records(),
            trigger = ?trigger,
            "Archived batch"
        );

        self.batches += 1;
        self.bytes += payload.len();
        self.last_persisted = Some(end);
        self.archiver.persisted_batches.fetch_add(1, Ordering::SeqCst);
        self.batch.reset();
        Ok(())
    }

    fn summary(&self, reason: Termination) -> ArchiveSummary {
        ArchiveSummary {
            resumed_from: self.resumed_from,
            batches: self.batches,
            bytes: self.bytes,
            last_persisted: self.last_persisted,
            reason,
        }
    }
}
