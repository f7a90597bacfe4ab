//! Archive storage for persisted batches.
//!
//! An [`ArchiveStore`] durably records contiguous batches of record payloads
//! tagged with their `[start, end]` positions, and reports the last persisted
//! position so archiving can resume after a restart.
//!
//! ## Storage Backends
//!
//! - `FilesystemArchiveStore` - one file per batch under a base directory
//! - `MockArchiveStore` (tests only) - in-memory, with failure injection

mod filesystem;
#[cfg(test)]
pub mod mock;

pub use filesystem::FilesystemArchiveStore;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::position::Position;

/// File name prefix for persisted batches.
pub const BATCH_FILE_PREFIX: &str = "oplog_";
/// File extension for persisted batches.
pub const BATCH_FILE_EXTENSION: &str = "bin";

/// Errors that can occur during archive store operations.
#[derive(Debug, Error)]
pub enum ArchiveStoreError {
    #[error("Failed to persist batch {start}..{end}: {reason}")]
    PersistFailed {
        start: Position,
        end: Position,
        reason: String,
    },

    #[error("Failed to read archive state: {0}")]
    ResumeFailed(String),

    #[error("Invalid batch bounds: start {start} is after end {end}")]
    InvalidBounds { start: Position, end: Position },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for archive store operations.
pub type Result<T> = std::result::Result<T, ArchiveStoreError>;

/// Where archiving resumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeState {
    /// Last persisted position, or `Position::ZERO` on an initial run.
    pub position: Position,
    /// True when no batch has ever been persisted.
    pub is_initial: bool,
}

impl ResumeState {
    pub fn initial() -> Self {
        Self {
            position: Position::ZERO,
            is_initial: true,
        }
    }

    pub fn resume_from(position: Position) -> Self {
        Self {
            position,
            is_initial: false,
        }
    }
}

/// Position bounds of a persisted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchKey {
    pub start: Position,
    pub end: Position,
}

impl BatchKey {
    /// Parse a batch key from a file name such as `oplog_1.0_2.5.bin`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name
            .strip_prefix(BATCH_FILE_PREFIX)?
            .strip_suffix(BATCH_FILE_EXTENSION)?
            .strip_suffix('.')?;
        let (start, end) = stem.split_once('_')?;
        let key = Self {
            start: start.parse().ok()?,
            end: end.parse().ok()?,
        };
        (key.start <= key.end).then_some(key)
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}{}_{}.{}",
            BATCH_FILE_PREFIX, self.start, self.end, BATCH_FILE_EXTENSION
        )
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Durable batch storage.
///
/// `persist_batch` must be atomic: either the whole batch is recorded or
/// none of it is, and a failed call must not move the resume position.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Report where archiving should resume.
    async fn resume_position(&self) -> Result<ResumeState>;

    /// Durably persist one batch covering `[start, end]`.
    async fn persist_batch(&self, payload: &[u8], start: Position, end: Position) -> Result<()>;
}
