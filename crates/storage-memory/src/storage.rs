//! Storage backend implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shardtail_processor::{ProcessorState, StateStorage, StorageError};
use shardtail_types::{Nonce, NonceByShard, Shard};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

/// In-memory storage: nonces live for the lifetime of the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    nonces: Mutex<NonceByShard>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded storage, e.g. to start a follower at a known height.
    pub fn with_nonces(nonces: NonceByShard) -> Self {
        Self {
            nonces: Mutex::new(nonces),
        }
    }

    fn snapshot(&self) -> NonceByShard {
        self.nonces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl StateStorage for MemoryStorage {
    async fn load(&self, shards: &[Shard]) -> Result<NonceByShard, StorageError> {
        let stored = self.snapshot();
        let nonces = shards
            .iter()
            .map(|&shard| (shard, stored.get(&shard).copied().unwrap_or(Nonce(0))))
            .collect();

        Ok(nonces)
    }

    async fn persist(
        &self,
        shards: &[Shard],
        state: &ProcessorState,
    ) -> Result<(), StorageError> {
        let mut stored = self
            .nonces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for &shard in shards {
            if let Some(nonce) = state.last_processed(shard) {
                stored.insert(shard, nonce);
            }
        }
        debug!(shards = shards.len(), "persisted last processed nonces");

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedNonce {
    shard: Shard,
    nonce: Nonce,
}

/// File-backed storage: last-processed nonces as a JSON document.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Storage at `path`. A missing file reads as empty state.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_nonces(&self) -> Result<NonceByShard, StorageError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no state file yet, starting fresh");
            return Ok(NonceByShard::new());
        }

        let raw = std::fs::read_to_string(&self.path)
            .map_err(|err| StorageError::Load(err.to_string()))?;
        let entries: Vec<PersistedNonce> =
            serde_json::from_str(&raw).map_err(|err| StorageError::Load(err.to_string()))?;

        Ok(entries.into_iter().map(|e| (e.shard, e.nonce)).collect())
    }
}

#[async_trait]
impl StateStorage for JsonFileStorage {
    async fn load(&self, shards: &[Shard]) -> Result<NonceByShard, StorageError> {
        let stored = self.read_nonces()?;
        let nonces = shards
            .iter()
            .map(|&shard| (shard, stored.get(&shard).copied().unwrap_or(Nonce(0))))
            .collect();

        Ok(nonces)
    }

    async fn persist(
        &self,
        shards: &[Shard],
        state: &ProcessorState,
    ) -> Result<(), StorageError> {
        let mut entries: Vec<PersistedNonce> = shards
            .iter()
            .filter_map(|&shard| {
                state
                    .last_processed(shard)
                    .map(|nonce| PersistedNonce { shard, nonce })
            })
            .collect();
        entries.sort_by_key(|e| e.shard);

        let raw = serde_json::to_string_pretty(&entries)
            .map_err(|err| StorageError::Persist(err.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|err| StorageError::Persist(err.to_string()))?;

        debug!(path = %self.path.display(), shards = entries.len(), "persisted state file");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(u32, u64)]) -> ProcessorState {
        let nonces: NonceByShard = pairs.iter().map(|&(s, n)| (Shard(s), Nonce(n))).collect();
        ProcessorState::new(nonces.clone(), nonces)
    }

    #[tokio::test]
    async fn memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        let shards = vec![Shard(0), Shard(1)];

        let loaded = storage.load(&shards).await.unwrap();
        assert_eq!(loaded.get(&Shard(0)), Some(&Nonce(0)));

        storage
            .persist(&shards, &state(&[(0, 42), (1, 7)]))
            .await
            .unwrap();

        let loaded = storage.load(&shards).await.unwrap();
        assert_eq!(loaded.get(&Shard(0)), Some(&Nonce(42)));
        assert_eq!(loaded.get(&Shard(1)), Some(&Nonce(7)));
    }

    #[tokio::test]
    async fn file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let shards = vec![Shard(0), Shard::METACHAIN];

        let storage = JsonFileStorage::new(&path);
        let loaded = storage.load(&shards).await.unwrap();
        assert_eq!(loaded.get(&Shard::METACHAIN), Some(&Nonce(0)));

        storage
            .persist(&shards, &state(&[(0, 10), (u32::MAX, 99)]))
            .await
            .unwrap();

        // A second storage value over the same path sees the nonces.
        let reopened = JsonFileStorage::new(&path);
        let loaded = reopened.load(&shards).await.unwrap();
        assert_eq!(loaded.get(&Shard(0)), Some(&Nonce(10)));
        assert_eq!(loaded.get(&Shard::METACHAIN), Some(&Nonce(99)));
    }

    #[tokio::test]
    async fn unknown_shards_default_to_zero() {
        let storage = MemoryStorage::with_nonces(
            [(Shard(0), Nonce(5))].into_iter().collect(),
        );
        let loaded = storage.load(&[Shard(0), Shard(7)]).await.unwrap();

        assert_eq!(loaded.get(&Shard(0)), Some(&Nonce(5)));
        assert_eq!(loaded.get(&Shard(7)), Some(&Nonce(0)));
    }
}
