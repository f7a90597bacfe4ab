//! Record sources.
//!
//! A [`RecordSource`] opens a session on the source database's change stream
//! starting at a given position. Records are produced by a background task
//! and delivered over a single-consumer channel; the task's handle is
//! returned alongside the channel so the consumer can join it on shutdown.
//!
//! ## Sources
//!
//! - `JsonLinesSource` - newline-delimited JSON records from any async reader
//! - `MockRecordSource` (tests only) - scripted records

mod json_lines;
#[cfg(test)]
pub mod mock;

pub use json_lines::{JsonLinesSource, WireRecord};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::position::Position;

/// Default capacity of the record channel between producer and loop.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Errors raised by a record source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Failed to open stream at {from}: {reason}")]
    Open { from: Position, reason: String },

    #[error("Failed to fetch record: {0}")]
    Fetch(String),

    #[error("Malformed record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// A single change-log record. The payload is opaque to the archiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub position: Position,
    pub payload: Bytes,
}

impl Record {
    pub fn new(position: Position, payload: impl Into<Bytes>) -> Self {
        Self {
            position,
            payload: payload.into(),
        }
    }
}

/// Channel item. An `Err` item is terminal: the producer stops after sending it.
pub type RecordResult = Result<Record, SourceError>;

/// An open streaming session.
pub struct RecordStream {
    /// Records in stream order. Closed on graceful end-of-stream.
    pub records: mpsc::Receiver<RecordResult>,
    /// Background producer. Must be awaited before the consumer returns.
    pub worker: JoinHandle<()>,
}

/// Produces an ordered stream of records from a position onwards.
///
/// Positions are unique per record and strictly increase within a session;
/// the resume anchor relies on this.
///
/// Implementations must stop producing and drop their sender once `cancel`
/// fires, so that joining `RecordStream::worker` always terminates.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Open a session yielding records at positions `>= from`.
    async fn stream_from(
        &self,
        cancel: CancellationToken,
        from: Position,
    ) -> Result<RecordStream, SourceError>;

    /// Whether a later session can re-read records from an earlier position.
    /// Sessions over a source that cannot replay are never restarted.
    fn replayable(&self) -> bool {
        true
    }
}
