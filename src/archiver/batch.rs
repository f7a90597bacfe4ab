//! In-memory batch accumulation.

use bytes::{Bytes, BytesMut};

use crate::archive::BatchKey;
use crate::position::Position;

/// Buffered run of record payloads awaiting a flush.
///
/// Owned exclusively by the archiving loop. `reset` is only called after the
/// batch has been handed to the store successfully.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    payload: BytesMut,
    start: Option<Position>,
    end: Option<Position>,
    records: usize,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record's payload into the batch.
    pub fn append(&mut self, position: Position, payload: &Bytes) {
        self.start.get_or_insert(position);
        self.end = Some(position);
        self.payload.extend_from_slice(payload);
        self.records += 1;
    }

    /// Buffered payload length in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// True when no record has been folded since the last reset.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// Position bounds of the buffered records.
    pub fn bounds(&self) -> Option<BatchKey> {
        Some(BatchKey {
            start: self.start?,
            end: self.end?,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn reset(&mut self) {
        self.payload.clear();
        self.start = None;
        self.end = None;
        self.records = 0;
    }
}
