//! Archiving session faults.

use std::fmt;

use thiserror::Error;

use crate::archive::ArchiveStoreError;
use crate::position::Position;
use crate::source::SourceError;
use crate::validation::ValidationError;

/// Fault classification surfaced to supervisors and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The archive store could not report where to resume.
    Resume,
    /// The record source failed to open or to produce further records.
    Stream,
    /// The archive and the source have diverged; needs re-seeding.
    Continuity,
    /// A record failed validation; the archive session is broken.
    Validation,
    /// The archive store rejected a batch.
    Persist,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::Resume => "resume",
            FaultKind::Stream => "stream",
            FaultKind::Continuity => "continuity",
            FaultKind::Validation => "validation",
            FaultKind::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Error ending an archiving session.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to read resume position: {0}")]
    Resume(#[source] ArchiveStoreError),

    #[error("Failed to open record stream: {0}")]
    OpenStream(#[source] SourceError),

    #[error("Record stream failed: {0}")]
    Stream(#[source] SourceError),

    #[error("Archive gap: storage last position {expected}, but source resumes at {actual}")]
    Gap { expected: Position, actual: Position },

    #[error("Record at {position} failed validation: {source}")]
    Validation {
        position: Position,
        #[source]
        source: ValidationError,
    },

    #[error("Failed to persist batch [{start}, {end}]: {source}")]
    Persist {
        start: Position,
        end: Position,
        #[source]
        source: ArchiveStoreError,
    },
}

impl ArchiveError {
    pub fn kind(&self) -> FaultKind {
        match self {
            ArchiveError::Resume(_) => FaultKind::Resume,
            ArchiveError::OpenStream(_) | ArchiveError::Stream(_) => FaultKind::Stream,
            ArchiveError::Gap { .. } => FaultKind::Continuity,
            ArchiveError::Validation { .. } => FaultKind::Validation,
            ArchiveError::Persist { .. } => FaultKind::Persist,
        }
    }

    /// Whether a fresh session from the last durable position may succeed.
    ///
    /// Continuity and validation faults need operator remediation.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), FaultKind::Continuity | FaultKind::Validation)
    }
}
