//! Read-only store over externally-generated embeddings.
//!
//! Some vaults get their embeddings from another tool and expose them as a
//! backing index this core can only read. This store implements the full
//! [`EmbeddingStore`] interface so callers never special-case it: write
//! operations log a warning and do nothing, and reads are served from a
//! cache that re-reads the backing index only after a TTL elapses or a
//! caller forces a refresh.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use notemesh_core::defaults::READONLY_REFRESH_TTL_SECS;
use notemesh_core::{
    EmbeddingSource, EmbeddingStore, FindSimilarOptions, NoteId, RefreshableEmbeddingStore, Result,
    SimilarHit, StoreStats, StoredEmbedding,
};

use crate::scan::scan_similar;

#[derive(Debug, Default)]
struct ReadOnlyCache {
    records: BTreeMap<NoteId, StoredEmbedding>,
    loaded_at: Option<Instant>,
    last_updated: Option<DateTime<Utc>>,
}

/// Read-only embedding store with TTL-cached reads from a backing source.
pub struct ReadOnlyEmbeddingStore {
    source: Box<dyn EmbeddingSource>,
    cache: RwLock<ReadOnlyCache>,
    ttl: Duration,
}

impl ReadOnlyEmbeddingStore {
    /// Create a store over the given backing source with the default TTL.
    pub fn new(source: Box<dyn EmbeddingSource>) -> Self {
        Self::with_ttl(source, Duration::from_secs(READONLY_REFRESH_TTL_SECS))
    }

    /// Create a store with a custom cache TTL.
    pub fn with_ttl(source: Box<dyn EmbeddingSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: RwLock::new(ReadOnlyCache::default()),
            ttl,
        }
    }

    /// Reload the cache when it has never been loaded or the TTL elapsed.
    async fn ensure_fresh(&self) -> Result<()> {
        let needs_load = {
            let cache = self.cache.read().await;
            match cache.loaded_at {
                None => true,
                Some(at) => at.elapsed() > self.ttl,
            }
        };
        if needs_load {
            self.reload().await?;
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        let records = self.source.load().await?;
        let mut cache = self.cache.write().await;
        cache.last_updated = records.iter().map(|r| r.updated_at).max();
        cache.records = records
            .into_iter()
            .map(|r| (r.note_id.clone(), r))
            .collect();
        cache.loaded_at = Some(Instant::now());
        info!(
            count = cache.records.len(),
            source = %self.source.description(),
            "Refreshed read-only embedding cache"
        );
        Ok(())
    }
}

#[async_trait]
impl EmbeddingStore for ReadOnlyEmbeddingStore {
    async fn save(&self, record: StoredEmbedding) -> Result<()> {
        warn!(
            note_id = %record.note_id,
            "save ignored: embedding store is read-only"
        );
        Ok(())
    }

    async fn save_batch(&self, records: Vec<StoredEmbedding>) -> Result<()> {
        warn!(
            count = records.len(),
            "save_batch ignored: embedding store is read-only"
        );
        Ok(())
    }

    async fn get(&self, id: &NoteId) -> Result<Option<StoredEmbedding>> {
        self.ensure_fresh().await?;
        Ok(self.cache.read().await.records.get(id).cloned())
    }

    async fn is_stale(&self, id: &NoteId, current_hash: &str) -> Result<bool> {
        self.ensure_fresh().await?;
        let cache = self.cache.read().await;
        Ok(match cache.records.get(id) {
            None => true,
            Some(record) => record.content_hash != current_hash,
        })
    }

    async fn find_similar(
        &self,
        query: &[f32],
        opts: &FindSimilarOptions,
    ) -> Result<Vec<SimilarHit>> {
        self.ensure_fresh().await?;
        let cache = self.cache.read().await;
        let hits = scan_similar(cache.records.values(), query, opts)?;
        debug!(result_count = hits.len(), "Read-only similarity scan complete");
        Ok(hits)
    }

    async fn delete(&self, id: &NoteId) -> Result<()> {
        warn!(note_id = %id, "delete ignored: embedding store is read-only");
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        warn!("clear ignored: embedding store is read-only");
        Ok(0)
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.ensure_fresh().await?;
        let cache = self.cache.read().await;
        let estimated_size_bytes: u64 = cache
            .records
            .values()
            .map(|r| (r.vector.len() * std::mem::size_of::<f32>()) as u64 + 256)
            .sum();
        Ok(StoreStats {
            count: cache.records.len(),
            last_updated: cache.last_updated,
            estimated_size_bytes,
        })
    }

    async fn flush(&self) -> Result<()> {
        warn!("flush ignored: embedding store is read-only");
        Ok(())
    }
}

#[async_trait]
impl RefreshableEmbeddingStore for ReadOnlyEmbeddingStore {
    async fn refresh(&self, force: bool) -> Result<()> {
        if force {
            self.reload().await
        } else {
            self.ensure_fresh().await
        }
    }

    fn source_info(&self) -> String {
        self.source.description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn record(id: &str, vector: Vec<f32>) -> StoredEmbedding {
        StoredEmbedding::new(
            NoteId::new(id).unwrap(),
            format!("notes/{}.md", id),
            format!("Note {}", id),
            "hash",
            vector,
            "external-model",
            "external",
        )
        .unwrap()
    }

    struct CountingSource {
        loads: Arc<AtomicUsize>,
        records: Vec<StoredEmbedding>,
    }

    #[async_trait]
    impl EmbeddingSource for CountingSource {
        async fn load(&self) -> Result<Vec<StoredEmbedding>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }

        fn description(&self) -> String {
            "counting test source".to_string()
        }
    }

    fn counting_store(ttl: Duration) -> (ReadOnlyEmbeddingStore, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            loads: loads.clone(),
            records: vec![
                record("202401010001", vec![1.0, 0.0]),
                record("202401010002", vec![0.0, 1.0]),
            ],
        };
        (
            ReadOnlyEmbeddingStore::with_ttl(Box::new(source), ttl),
            loads,
        )
    }

    #[tokio::test]
    async fn test_reads_served_from_cache_within_ttl() {
        let (store, loads) = counting_store(Duration::from_secs(600));
        let id = NoteId::new("202401010001").unwrap();

        assert!(store.get(&id).await.unwrap().is_some());
        assert!(store.get(&id).await.unwrap().is_some());
        assert_eq!(store.stats().await.unwrap().count, 2);

        // one load despite three reads
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forced_refresh_reloads() {
        let (store, loads) = counting_store(Duration::from_secs(600));
        let id = NoteId::new("202401010001").unwrap();

        store.get(&id).await.unwrap();
        store.refresh(true).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        // non-forced refresh inside the TTL does nothing
        store.refresh(false).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ttl_expiry_reloads() {
        let (store, loads) = counting_store(Duration::from_millis(0));
        let id = NoteId::new("202401010001").unwrap();

        store.get(&id).await.unwrap();
        // zero TTL: every read reloads
        store.get(&id).await.unwrap();
        assert!(loads.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_writes_are_warned_noops() {
        let (store, loads) = counting_store(Duration::from_secs(600));

        store.save(record("202401010009", vec![0.5, 0.5])).await.unwrap();
        store
            .save_batch(vec![record("202401010008", vec![0.5, 0.5])])
            .await
            .unwrap();
        store
            .delete(&NoteId::new("202401010001").unwrap())
            .await
            .unwrap();
        assert_eq!(store.clear().await.unwrap(), 0);
        store.flush().await.unwrap();

        // writes never touched the source or the cache
        assert_eq!(store.stats().await.unwrap().count, 2);
        assert!(store
            .get(&NoteId::new("202401010001").unwrap())
            .await
            .unwrap()
            .is_some());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_is_stale_against_external_hashes() {
        let (store, _) = counting_store(Duration::from_secs(600));
        let id = NoteId::new("202401010001").unwrap();

        assert!(!store.is_stale(&id, "hash").await.unwrap());
        assert!(store.is_stale(&id, "different").await.unwrap());
        assert!(store
            .is_stale(&NoteId::new("209901010101").unwrap(), "hash")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_find_similar_from_cache() {
        let (store, _) = counting_store(Duration::from_secs(600));
        let hits = store
            .find_similar(&[1.0, 0.0], &FindSimilarOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].note_id.as_str(), "202401010001");
    }

    #[tokio::test]
    async fn test_source_info() {
        let (store, _) = counting_store(Duration::from_secs(600));
        assert_eq!(store.source_info(), "counting test source");
    }
}
