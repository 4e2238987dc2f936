//! Self-managed local embedding store.
//!
//! Records live in an in-memory map keyed by note id. With a backing path
//! configured, the whole map persists as a single JSON document:
//!
//! ```json
//! {
//!   "embeddings": { "<note-id>": { ...record... } },
//!   "metadata": { "lastUpdated": "...", "version": 1 }
//! }
//! ```
//!
//! Writes are buffered in memory; callers must [`flush`] after a batch of
//! mutations before relying on the data surviving a restart.
//!
//! [`flush`]: notemesh_core::EmbeddingStore::flush

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use notemesh_core::defaults::STORE_FORMAT_VERSION;
use notemesh_core::{
    EmbeddingStore, Error, FindSimilarOptions, NoteId, Result, SimilarHit, StoreStats,
    StoredEmbedding,
};

use crate::scan::scan_similar;

/// Persisted document layout.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    embeddings: BTreeMap<NoteId, StoredEmbedding>,
    metadata: StoreMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreMetadata {
    last_updated: Option<DateTime<Utc>>,
    version: u32,
}

#[derive(Debug, Default)]
struct StoreState {
    /// BTreeMap so iteration (and therefore similarity tie-breaking) is
    /// deterministic by note id.
    embeddings: BTreeMap<NoteId, StoredEmbedding>,
    last_updated: Option<DateTime<Utc>>,
    dirty: bool,
}

/// In-memory embedding store with optional JSON document persistence.
pub struct LocalEmbeddingStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
}

impl LocalEmbeddingStore {
    /// Create an empty store with no persistence.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            path: None,
        }
    }

    /// Open a store backed by a JSON document, loading existing records
    /// if the file is present.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = StoreState::default();

        if tokio::fs::try_exists(&path).await? {
            let raw = tokio::fs::read_to_string(&path).await?;
            let doc: StoreDocument = serde_json::from_str(&raw)
                .map_err(|e| Error::Store(format!("Corrupt store document: {}", e)))?;
            info!(
                count = doc.embeddings.len(),
                path = %path.display(),
                "Loaded embedding store"
            );
            state.embeddings = doc.embeddings;
            state.last_updated = doc.metadata.last_updated;
        }

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// Whether there are buffered writes not yet flushed.
    pub async fn is_dirty(&self) -> bool {
        self.state.read().await.dirty
    }
}

#[async_trait]
impl EmbeddingStore for LocalEmbeddingStore {
    async fn save(&self, record: StoredEmbedding) -> Result<()> {
        let mut state = self.state.write().await;
        state.embeddings.insert(record.note_id.clone(), record);
        state.last_updated = Some(Utc::now());
        state.dirty = true;
        Ok(())
    }

    async fn save_batch(&self, records: Vec<StoredEmbedding>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        for record in records {
            state.embeddings.insert(record.note_id.clone(), record);
        }
        state.last_updated = Some(Utc::now());
        state.dirty = true;
        Ok(())
    }

    async fn get(&self, id: &NoteId) -> Result<Option<StoredEmbedding>> {
        Ok(self.state.read().await.embeddings.get(id).cloned())
    }

    async fn is_stale(&self, id: &NoteId, current_hash: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(match state.embeddings.get(id) {
            None => true,
            Some(record) => record.content_hash != current_hash,
        })
    }

    #[instrument(skip(self, query, opts), fields(subsystem = "store", component = "local_store", op = "find_similar"))]
    async fn find_similar(
        &self,
        query: &[f32],
        opts: &FindSimilarOptions,
    ) -> Result<Vec<SimilarHit>> {
        let state = self.state.read().await;
        let hits = scan_similar(state.embeddings.values(), query, opts)?;
        debug!(result_count = hits.len(), "Similarity scan complete");
        Ok(hits)
    }

    async fn delete(&self, id: &NoteId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.embeddings.remove(id).is_some() {
            state.last_updated = Some(Utc::now());
            state.dirty = true;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        let count = state.embeddings.len();
        state.embeddings.clear();
        state.last_updated = Some(Utc::now());
        state.dirty = true;
        Ok(count)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read().await;
        let estimated_size_bytes: u64 = state
            .embeddings
            .values()
            .map(|r| (r.vector.len() * std::mem::size_of::<f32>()) as u64 + 256)
            .sum();
        Ok(StoreStats {
            count: state.embeddings.len(),
            last_updated: state.last_updated,
            estimated_size_bytes,
        })
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            // Purely in-memory store: flush is a no-op.
            return Ok(());
        };

        let mut state = self.state.write().await;
        if !state.dirty {
            return Ok(());
        }

        let doc = StoreDocument {
            embeddings: state.embeddings.clone(),
            metadata: StoreMetadata {
                last_updated: state.last_updated,
                version: STORE_FORMAT_VERSION,
            },
        };
        let raw = serde_json::to_string(&doc)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so a crash mid-write never corrupts the store.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, path).await?;

        state.dirty = false;
        debug!(
            count = state.embeddings.len(),
            path = %path.display(),
            "Flushed embedding store"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, hash: &str, vector: Vec<f32>) -> StoredEmbedding {
        StoredEmbedding::new(
            NoteId::new(id).unwrap(),
            format!("notes/{}.md", id),
            format!("Note {}", id),
            hash,
            vector,
            "mock-embed",
            "mock",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let store = LocalEmbeddingStore::in_memory();
        let rec = record("202401010001", "h1", vec![0.1, 0.2, 0.3]);

        store.save(rec.clone()).await.unwrap();
        let loaded = store.get(&rec.note_id).await.unwrap().unwrap();
        assert_eq!(loaded.vector, rec.vector);
        assert_eq!(loaded.content_hash, rec.content_hash);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = LocalEmbeddingStore::in_memory();
        let missing = store
            .get(&NoteId::new("209901010101").unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_save_is_upsert_not_duplicate() {
        let store = LocalEmbeddingStore::in_memory();
        store
            .save(record("202401010001", "h1", vec![0.1]))
            .await
            .unwrap();
        store
            .save(record("202401010001", "h2", vec![0.2]))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.count, 1);

        let rec = store
            .get(&NoteId::new("202401010001").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.content_hash, "h2");
        assert_eq!(rec.vector, vec![0.2]);
    }

    #[tokio::test]
    async fn test_staleness_lifecycle() {
        let store = LocalEmbeddingStore::in_memory();
        let id = NoteId::new("202401010001").unwrap();

        // no record: stale
        assert!(store.is_stale(&id, "h1").await.unwrap());

        store
            .save(record("202401010001", "h1", vec![0.1]))
            .await
            .unwrap();

        // fresh immediately after save with same hash
        assert!(!store.is_stale(&id, "h1").await.unwrap());

        // stale again for a different hash
        assert!(store.is_stale(&id, "h2").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_batch() {
        let store = LocalEmbeddingStore::in_memory();
        store
            .save_batch(vec![
                record("202401010001", "h1", vec![0.1]),
                record("202401010002", "h2", vec![0.2]),
            ])
            .await
            .unwrap();

        assert_eq!(store.stats().await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = LocalEmbeddingStore::in_memory();
        store
            .save_batch(vec![
                record("202401010001", "h1", vec![0.1]),
                record("202401010002", "h2", vec![0.2]),
            ])
            .await
            .unwrap();

        store
            .delete(&NoteId::new("202401010001").unwrap())
            .await
            .unwrap();
        assert_eq!(store.stats().await.unwrap().count, 1);

        // deleting a missing id is a no-op
        store
            .delete(&NoteId::new("209901010101").unwrap())
            .await
            .unwrap();

        let cleared = store.clear().await.unwrap();
        assert_eq!(cleared, 1);
        assert_eq!(store.stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_find_similar_excludes_and_sorts() {
        let store = LocalEmbeddingStore::in_memory();
        store
            .save_batch(vec![
                record("202401010001", "h1", vec![1.0, 0.0]),
                record("202401010002", "h2", vec![0.9, 0.1]),
                record("202401010003", "h3", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store
            .find_similar(
                &[1.0, 0.0],
                &FindSimilarOptions {
                    limit: 10,
                    threshold: 0.5,
                    exclude_ids: vec![NoteId::new("202401010001").unwrap()],
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].note_id.as_str(), "202401010002");
    }

    #[tokio::test]
    async fn test_stats_tracks_size_and_timestamp() {
        let store = LocalEmbeddingStore::in_memory();
        assert!(store.stats().await.unwrap().last_updated.is_none());

        store
            .save(record("202401010001", "h1", vec![0.0; 768]))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.count, 1);
        assert!(stats.last_updated.is_some());
        assert!(stats.estimated_size_bytes >= 768 * 4);
    }

    #[tokio::test]
    async fn test_in_memory_flush_is_noop() {
        let store = LocalEmbeddingStore::in_memory();
        store
            .save(record("202401010001", "h1", vec![0.1]))
            .await
            .unwrap();
        store.flush().await.unwrap();
        assert!(store.is_dirty().await);
    }
}
