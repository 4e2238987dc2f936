//! Integration tests for store persistence across reopen.

use notemesh_core::{EmbeddingStore, FindSimilarOptions, NoteId, StoredEmbedding};
use notemesh_store::LocalEmbeddingStore;

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
async fn flushed_records_survive_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("embeddings.json");

    {
        let store = LocalEmbeddingStore::open(&path).await?;
        store
            .save_batch(vec![
                record("202401010001", "h1", vec![0.25, -0.5, 1.0]),
                record("202401010002", "h2", vec![0.0, 1.0, 0.0]),
            ])
            .await?;
        store.flush().await?;
    }

    let reopened = LocalEmbeddingStore::open(&path).await?;
    let stats = reopened.stats().await?;
    assert_eq!(stats.count, 2);
    assert!(stats.last_updated.is_some());

    // vectors round-trip byte-identically with matching content hash
    let rec = reopened
        .get(&NoteId::new("202401010001").unwrap())
        .await?
        .expect("record should survive reopen");
    assert_eq!(rec.vector, vec![0.25, -0.5, 1.0]);
    assert_eq!(rec.content_hash, "h1");
    assert_eq!(rec.dimensions, 3);

    // staleness is judged from the reloaded hash
    assert!(!reopened
        .is_stale(&NoteId::new("202401010001").unwrap(), "h1")
        .await?);
    assert!(reopened
        .is_stale(&NoteId::new("202401010001").unwrap(), "edited")
        .await?);

    Ok(())
}

#[tokio::test]
async fn unflushed_records_do_not_survive_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("embeddings.json");

    {
        let store = LocalEmbeddingStore::open(&path).await?;
        store.save(record("202401010001", "h1", vec![0.1])).await?;
        // no flush: the write stays buffered in memory
    }

    let reopened = LocalEmbeddingStore::open(&path).await?;
    assert_eq!(reopened.stats().await?.count, 0);
    Ok(())
}

#[tokio::test]
async fn persisted_document_uses_expected_layout() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("embeddings.json");

    let store = LocalEmbeddingStore::open(&path).await?;
    store.save(record("202401010001", "h1", vec![0.5])).await?;
    store.flush().await?;

    let raw = std::fs::read_to_string(&path)?;
    let doc: serde_json::Value = serde_json::from_str(&raw)?;

    // two top-level keys: embeddings map and metadata block
    let embeddings = doc.get("embeddings").expect("embeddings key");
    assert!(embeddings.get("202401010001").is_some());

    let metadata = doc.get("metadata").expect("metadata key");
    assert!(metadata.get("lastUpdated").is_some());
    assert_eq!(metadata.get("version").and_then(|v| v.as_u64()), Some(1));

    // record fields are camelCase
    let rec = &embeddings["202401010001"];
    assert!(rec.get("noteId").is_some());
    assert!(rec.get("contentHash").is_some());
    assert!(rec.get("notePath").is_some());

    Ok(())
}

#[tokio::test]
async fn clear_then_flush_empties_the_document() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("embeddings.json");

    let store = LocalEmbeddingStore::open(&path).await?;
    store
        .save_batch(vec![
            record("202401010001", "h1", vec![0.1]),
            record("202401010002", "h2", vec![0.2]),
        ])
        .await?;
    store.flush().await?;

    assert_eq!(store.clear().await?, 2);
    store.flush().await?;

    let reopened = LocalEmbeddingStore::open(&path).await?;
    assert_eq!(reopened.stats().await?.count, 0);
    assert!(reopened
        .find_similar(&[1.0], &FindSimilarOptions::default())
        .await?
        .is_empty());
    Ok(())
}
