//! Filesystem-based archive storage.
//!
//! Stores each batch as a file directly under the base directory:
//! ```text
//! {base_path}/
//!   oplog_{start}_{end}.bin
//! ```
//!
//! The resume position is the greatest `end` among well-formed batch names.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{ArchiveStore, ArchiveStoreError, BatchKey, Result, ResumeState};
use crate::position::Position;

/// Filesystem-based archive store.
pub struct FilesystemArchiveStore {
    base_path: PathBuf,
}

impl FilesystemArchiveStore {
    /// Create a new filesystem archive store.
    ///
    /// Creates the base directory if it doesn't exist.
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the file path for a batch.
    pub fn path_for(&self, key: &BatchKey) -> PathBuf {
        self.base_path.join(key.file_name())
    }

    /// List persisted batches ordered by start position.
    pub async fn list_batches(&self) -> Result<Vec<BatchKey>> {
        let mut keys = Vec::new();

        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.ends_with(".tmp") {
                continue;
            }
            match BatchKey::from_file_name(name) {
                Some(key) => keys.push(key),
                None => {
                    warn!(file = %name, "Skipping unrecognised file in archive directory");
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Read a persisted batch back.
    pub async fn read_batch(&self, key: &BatchKey) -> Result<Vec<u8>> {
        Ok(fs::read(self.path_for(key)).await?)
    }
}

#[async_trait]
impl ArchiveStore for FilesystemArchiveStore {
    async fn resume_position(&self) -> Result<ResumeState> {
        let keys = self
            .list_batches()
            .await
            .map_err(|e| ArchiveStoreError::ResumeFailed(e.to_string()))?;

        Ok(match keys.iter().map(|key| key.end).max() {
            Some(end) => ResumeState::resume_from(end),
            None => ResumeState::initial(),
        })
    }

    async fn persist_batch(&self, payload: &[u8], start: Position, end: Position) -> Result<()> {
        if start > end {
            return Err(ArchiveStoreError::InvalidBounds { start, end });
        }
        let key = BatchKey { start, end };
        let path = self.path_for(&key);

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("tmp");
        let written = async {
            fs::write(&temp_path, payload).await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(ArchiveStoreError::PersistFailed {
                start,
                end,
                reason: e.to_string(),
            });
        }

        debug!(
            batch = %key,
            size = payload.len(),
            path = %path.display(),
            "Stored batch"
        );
        Ok(())
    }
}
