//! File-backed source for externally-generated embeddings.
//!
//! Reads the two-part layout written by external embedding tools: an
//! `index.json` mapping note id → `{path, contentHash, updatedAt}`, plus
//! one record document per note (`<note-id>.json`) with the full vector.
//! Records missing from disk or failing to parse are skipped with a
//! warning, so a partially-readable index still serves what it can.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use notemesh_core::{EmbeddingSource, NoteId, Result, StoredEmbedding};

/// One entry of the external index document. The full entry also carries
/// `path` and `updatedAt`; only the hash matters here, the rest lives in
/// the per-note record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry {
    content_hash: String,
}

/// Embedding source reading an index document plus record-per-note files
/// from a directory.
pub struct FileEmbeddingSource {
    dir: PathBuf,
}

impl FileEmbeddingSource {
    /// Index file name inside the source directory.
    pub const INDEX_FILE: &'static str = "index.json";

    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl EmbeddingSource for FileEmbeddingSource {
    async fn load(&self) -> Result<Vec<StoredEmbedding>> {
        let index_path = self.dir.join(Self::INDEX_FILE);
        if !tokio::fs::try_exists(&index_path).await? {
            debug!(path = %index_path.display(), "No external index, serving empty");
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read_to_string(&index_path).await?;
        let index: BTreeMap<NoteId, IndexEntry> = serde_json::from_str(&raw)
            .map_err(|e| notemesh_core::Error::Store(format!("Corrupt external index: {}", e)))?;

        let mut records = Vec::with_capacity(index.len());
        for (note_id, entry) in &index {
            let record_path = self.dir.join(format!("{}.json", note_id));
            let raw = match tokio::fs::read_to_string(&record_path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(note_id = %note_id, error = %e, "Missing record file, skipping");
                    continue;
                }
            };
            match serde_json::from_str::<StoredEmbedding>(&raw) {
                Ok(record) => {
                    if record.content_hash != entry.content_hash {
                        warn!(
                            note_id = %note_id,
                            "Index and record disagree on content hash, using record"
                        );
                    }
                    records.push(record);
                }
                Err(e) => {
                    warn!(note_id = %note_id, error = %e, "Unparseable record file, skipping");
                }
            }
        }

        debug!(
            indexed = index.len(),
            loaded = records.len(),
            "Loaded external embeddings"
        );
        Ok(records)
    }

    fn description(&self) -> String {
        format!("external embeddings at {}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notemesh_core::EmbeddingStore;

    use crate::ReadOnlyEmbeddingStore;

    fn write_record(dir: &Path, id: &str, hash: &str, vector: Vec<f32>) {
        let record = StoredEmbedding::new(
            NoteId::new(id).unwrap(),
            format!("notes/{}.md", id),
            format!("Note {}", id),
            hash,
            vector,
            "external-model",
            "external",
        )
        .unwrap();
        std::fs::write(
            dir.join(format!("{}.json", id)),
            serde_json::to_string(&record).unwrap(),
        )
        .unwrap();
    }

    fn write_index(dir: &Path, entries: &[(&str, &str)]) {
        let index: serde_json::Value = entries
            .iter()
            .map(|(id, hash)| {
                (
                    id.to_string(),
                    serde_json::json!({
                        "path": format!("notes/{}.md", id),
                        "contentHash": hash,
                        "updatedAt": "2024-01-15T10:30:00Z",
                    }),
                )
            })
            .collect::<serde_json::Map<String, serde_json::Value>>()
            .into();
        std::fs::write(
            dir.join(FileEmbeddingSource::INDEX_FILE),
            serde_json::to_string(&index).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_load_index_and_records() {
        let dir = tempfile::tempdir().unwrap();
        write_index(dir.path(), &[("202401010001", "h1"), ("202401010002", "h2")]);
        write_record(dir.path(), "202401010001", "h1", vec![1.0, 0.0]);
        write_record(dir.path(), "202401010002", "h2", vec![0.0, 1.0]);

        let source = FileEmbeddingSource::new(dir.path());
        let records = source.load().await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_directory_serves_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileEmbeddingSource::new(dir.path().join("nope"));
        assert!(source.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_record_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_index(dir.path(), &[("202401010001", "h1"), ("202401010002", "h2")]);
        write_record(dir.path(), "202401010001", "h1", vec![1.0, 0.0]);
        // no record file for the second id

        let source = FileEmbeddingSource::new(dir.path());
        let records = source.load().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].note_id.as_str(), "202401010001");
    }

    #[tokio::test]
    async fn test_backs_a_read_only_store() {
        let dir = tempfile::tempdir().unwrap();
        write_index(dir.path(), &[("202401010001", "h1")]);
        write_record(dir.path(), "202401010001", "h1", vec![1.0, 0.0]);

        let store = ReadOnlyEmbeddingStore::new(Box::new(FileEmbeddingSource::new(dir.path())));
        let record = store
            .get(&NoteId::new("202401010001").unwrap())
            .await
            .unwrap()
            .expect("record should load through the store");
        assert_eq!(record.content_hash, "h1");
        assert!(!store
            .is_stale(&NoteId::new("202401010001").unwrap(), "h1")
            .await
            .unwrap());
    }
}
