//! Mock ArchiveStore implementation for testing.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{ArchiveStore, ArchiveStoreError, BatchKey, Result, ResumeState};
use crate::position::Position;

/// A batch captured by the mock store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedBatch {
    pub key: BatchKey,
    pub payload: Bytes,
}

/// Mock archive store that keeps batches in memory.
#[derive(Default)]
pub struct MockArchiveStore {
    batches: RwLock<Vec<PersistedBatch>>,
    resume_override: RwLock<Option<ResumeState>>,
    fail_on_persist: RwLock<bool>,
    fail_next_persists: RwLock<usize>,
    fail_on_resume: RwLock<bool>,
    persist_attempts: RwLock<usize>,
}

impl MockArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that reports a prior archive ending at `position`.
    pub fn resuming_from(position: Position) -> Self {
        Self {
            resume_override: RwLock::new(Some(ResumeState::resume_from(position))),
            ..Default::default()
        }
    }

    pub async fn set_fail_on_persist(&self, fail: bool) {
        *self.fail_on_persist.write().await = fail;
    }

    /// Fail the next `count` persist calls, then succeed.
    pub async fn fail_next_persists(&self, count: usize) {
        *self.fail_next_persists.write().await = count;
    }

    pub async fn set_fail_on_resume(&self, fail: bool) {
        *self.fail_on_resume.write().await = fail;
    }

    pub async fn batches(&self) -> Vec<PersistedBatch> {
        self.batches.read().await.clone()
    }

    /// Concatenated payload of every persisted batch, in persist order.
    pub async fn archived_bytes(&self) -> Vec<u8> {
        self.batches
            .read()
            .await
            .iter()
            .flat_map(|batch| batch.payload.iter().copied())
            .collect()
    }

    /// Number of persist calls, including failed ones.
    pub async fn persist_attempts(&self) -> usize {
        *self.persist_attempts.read().await
    }
}

#[async_trait]
impl ArchiveStore for MockArchiveStore {
    async fn resume_position(&self) -> Result<ResumeState> {
        if *self.fail_on_resume.read().await {
            return Err(ArchiveStoreError::ResumeFailed("mock failure".to_string()));
        }
        if let Some(last) = self.batches.read().await.last() {
            return Ok(ResumeState::resume_from(last.key.end));
        }
        Ok(self
            .resume_override
            .read()
            .await
            .unwrap_or_else(ResumeState::initial))
    }

    async fn persist_batch(&self, payload: &[u8], start: Position, end: Position) -> Result<()> {
        *self.persist_attempts.write().await += 1;

        let mut remaining = self.fail_next_persists.write().await;
        if *self.fail_on_persist.read().await || *remaining > 0 {
            *remaining = remaining.saturating_sub(1);
            return Err(ArchiveStoreError::PersistFailed {
                start,
                end,
                reason: "mock failure".to_string(),
            });
        }
        if start > end {
            return Err(ArchiveStoreError::InvalidBounds { start, end });
        }

        self.batches.write().await.push(PersistedBatch {
            key: BatchKey { start, end },
            payload: Bytes::copy_from_slice(payload),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_then_resume_after_persist() {
        let store = MockArchiveStore::new();
        assert!(store.resume_position().await.unwrap().is_initial);

        store
            .persist_batch(b"ab", Position::new(1, 0), Position::new(2, 0))
            .await
            .unwrap();

        let state = store.resume_position().await.unwrap();
        assert_eq!(state, ResumeState::resume_from(Position::new(2, 0)));
        assert_eq!(store.archived_bytes().await, b"ab");
    }

    #[tokio::test]
    async fn test_fail_next_persists_then_recovers() {
        let store = MockArchiveStore::new();
        store.fail_next_persists(2).await;

        for _ in 0..2 {
            assert!(store
                .persist_batch(b"x", Position::new(1, 0), Position::new(1, 0))
                .await
                .is_err());
        }
        store
            .persist_batch(b"x", Position::new(1, 0), Position::new(1, 0))
            .await
            .unwrap();

        assert_eq!(store.persist_attempts().await, 3);
        assert_eq!(store.batches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_resuming_from_preset() {
        let store = MockArchiveStore::resuming_from(Position::new(7, 3));
        let state = store.resume_position().await.unwrap();
        assert_eq!(state, ResumeState::resume_from(Position::new(7, 3)));
    }
}
