//! Record validation.
//!
//! Validators check a single record for internal consistency before it is
//! folded into a batch. They are synchronous and must not have side effects
//! visible to the archiving loop.

use thiserror::Error;

use crate::source::Record;

/// Error constants for validation failures.
pub mod errmsg {
    pub const PAYLOAD_EMPTY: &str = "record payload is empty";
    pub const PAYLOAD_TOO_LARGE: &str = "record payload exceeds maximum size";
}

/// A record failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ValidationError {
    pub reason: String,
}

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Checks one record for well-formedness.
pub trait RecordValidator: Send + Sync {
    fn validate(&self, record: &Record) -> Result<(), ValidationError>;
}

/// Accepts every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl RecordValidator for NoopValidator {
    fn validate(&self, _record: &Record) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Rejects empty payloads and, when a limit is set, oversized ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadValidator {
    /// Maximum payload size in bytes. 0 disables the check.
    pub max_record_bytes: usize,
}

impl PayloadValidator {
    pub fn new(max_record_bytes: usize) -> Self {
        Self { max_record_bytes }
    }
}

impl RecordValidator for PayloadValidator {
    fn validate(&self, record: &Record) -> Result<(), ValidationError> {
        if record.payload.is_empty() {
            return Err(ValidationError::new(errmsg::PAYLOAD_EMPTY));
        }
        if self.max_record_bytes > 0 && record.payload.len() > self.max_record_bytes {
            return Err(ValidationError::new(format!(
                "{} (max: {}, got: {})",
                errmsg::PAYLOAD_TOO_LARGE,
                self.max_record_bytes,
                record.payload.len()
            )));
        }
        Ok(())
    }
}
