//! Embedding service: bridges the embedding provider and the store, with
//! change detection so unchanged notes are never re-embedded.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use notemesh_core::defaults;
use notemesh_core::{
    BatchFailure, CancelFlag, EmbedReport, EmbedStatus, EmbeddingBackend, EmbeddingStore, Error,
    FindSimilarOptions, Note, NoteId, NoteIndex, Result, SimilarHit, StoredEmbedding,
};
use notemesh_inference::{process_in_groups, BatchOptions, RetryOptions};

use crate::content::{content_hash, prepare_with_budget};

/// Configuration for the embedding service.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Notes vectorized per provider call during bulk embedding.
    pub batch_size: usize,
    /// Pause between batch groups in milliseconds.
    pub batch_delay_ms: u64,
    /// Character budget for prepared note text.
    pub max_content_chars: usize,
    /// Retry policy for provider calls.
    pub retry: RetryOptions,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::EMBED_BATCH_SIZE,
            batch_delay_ms: defaults::EMBED_BATCH_DELAY_MS,
            max_content_chars: defaults::EMBED_CONTENT_MAX_CHARS,
            retry: RetryOptions::default(),
        }
    }
}

impl EmbedConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `NOTEMESH_EMBED_BATCH_SIZE` | `10` | Notes per provider call |
    /// | `NOTEMESH_EMBED_BATCH_DELAY_MS` | `200` | Pause between batches |
    /// | `NOTEMESH_EMBED_MAX_CHARS` | `15000` | Prepared-text budget |
    pub fn from_env() -> Self {
        let mut config = Self {
            retry: RetryOptions::from_env(),
            ..Self::default()
        };

        if let Ok(v) = std::env::var("NOTEMESH_EMBED_BATCH_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                config.batch_size = n.max(1);
            }
        }
        if let Ok(v) = std::env::var("NOTEMESH_EMBED_BATCH_DELAY_MS") {
            if let Ok(n) = v.parse::<u64>() {
                config.batch_delay_ms = n;
            }
        }
        if let Ok(v) = std::env::var("NOTEMESH_EMBED_MAX_CHARS") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_content_chars = n;
            }
        }
        config
    }

    /// Set the batch size (minimum 1).
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the inter-batch delay.
    pub fn with_batch_delay_ms(mut self, ms: u64) -> Self {
        self.batch_delay_ms = ms;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

/// One note queued for embedding within an embed-all run.
#[derive(Debug, Clone)]
struct EmbedTask {
    id: NoteId,
    path: String,
    title: String,
    hash: String,
    prepared: String,
}

/// Orchestrates content preparation, staleness detection, batched vector
/// generation, and persistence.
///
/// Check-then-save sequences are serialized through an internal write
/// gate, so staleness-check followed by save stays logically atomic per
/// note id even on a multi-threaded runtime.
pub struct EmbeddingService {
    backend: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn EmbeddingStore>,
    notes: Arc<dyn NoteIndex>,
    provider: String,
    config: EmbedConfig,
    write_gate: Mutex<()>,
}

impl EmbeddingService {
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn EmbeddingStore>,
        notes: Arc<dyn NoteIndex>,
        provider: impl Into<String>,
        config: EmbedConfig,
    ) -> Self {
        Self {
            backend,
            store,
            notes,
            provider: provider.into(),
            config,
            write_gate: Mutex::new(()),
        }
    }

    /// Whether the service can generate embeddings at all.
    pub fn is_ready(&self) -> bool {
        self.backend.is_configured()
    }

    /// The store this service writes to.
    pub fn store(&self) -> &Arc<dyn EmbeddingStore> {
        &self.store
    }

    fn ensure_ready(&self) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotConfigured(
                "embedding provider is not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Embed a single note, skipping work when the stored vector is fresh.
    #[instrument(skip(self, note), fields(subsystem = "embed", component = "service", op = "embed_note", note_id = %note.id))]
    pub async fn embed_note(&self, note: &Note) -> Result<EmbedStatus> {
        self.ensure_ready()?;

        let content = note.content.as_deref().unwrap_or_default();
        let hash = content_hash(content);

        let _gate = self.write_gate.lock().await;

        if !self.store.is_stale(&note.id, &hash).await? {
            debug!("Embedding fresh, skipping");
            return Ok(EmbedStatus::Skipped);
        }

        let prepared = prepare_with_budget(content, self.config.max_content_chars);
        let texts = vec![prepared];
        let batch = notemesh_inference::with_retry("embed_note", &self.config.retry, || {
            self.backend.embed_texts(&texts)
        })
        .await?;

        let vector = batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("provider returned no vector".to_string()))?;

        let record = StoredEmbedding::new(
            note.id.clone(),
            note.path.clone(),
            note.title.clone(),
            hash,
            vector.values().to_vec(),
            batch.model,
            self.provider.clone(),
        )?;

        self.store.save(record).await?;
        self.store.flush().await?;
        info!("Embedded note");
        Ok(EmbedStatus::Embedded)
    }

    /// Embed every note in the vault that is stale or missing.
    ///
    /// Notes are processed in fixed-size batches, one provider call per
    /// batch, each wrapped in retry with backoff. A batch that exhausts
    /// its retries is recorded as failed, with all of its notes counted as
    /// failed, and the run continues with the next batch. `progress`
    /// fires after each batch with `(processed_so_far, total)`, where
    /// skipped-as-fresh notes count as already processed. Cancellation is
    /// checked before each batch; partial results are returned, never an
    /// error.
    #[instrument(skip_all, fields(subsystem = "embed", component = "service", op = "embed_all"))]
    pub async fn embed_all(
        &self,
        mut progress: impl FnMut(usize, usize),
        cancel: &CancelFlag,
    ) -> Result<EmbedReport> {
        self.ensure_ready()?;

        let _gate = self.write_gate.lock().await;

        let notes = self.notes.find_all().await?;
        let total = notes.len();

        // Partition into stale (needs embedding) and fresh (skip).
        let mut pending: Vec<EmbedTask> = Vec::new();
        let mut skipped = 0usize;
        for note in &notes {
            let content = note.content.as_deref().unwrap_or_default();
            let hash = content_hash(content);
            if self.store.is_stale(&note.id, &hash).await? {
                pending.push(EmbedTask {
                    id: note.id.clone(),
                    path: note.path.clone(),
                    title: note.title.clone(),
                    hash,
                    prepared: prepare_with_budget(content, self.config.max_content_chars),
                });
            } else {
                skipped += 1;
            }
        }

        info!(
            total,
            stale = pending.len(),
            skipped,
            "Starting embed-all run"
        );

        // Remember which ids land in which batch so group failures can be
        // reported per note.
        let batch_ids: Vec<Vec<NoteId>> = pending
            .chunks(self.config.batch_size)
            .map(|chunk| chunk.iter().map(|t| t.id.clone()).collect())
            .collect();

        let opts = BatchOptions::default()
            .with_group_size(self.config.batch_size)
            .with_delay_between_groups_ms(self.config.batch_delay_ms)
            .with_retry(self.config.retry.clone());

        let provider = self.provider.clone();
        let outcome = process_in_groups(
            "embed_batch",
            pending,
            &opts,
            cancel,
            |group: Vec<EmbedTask>| {
                let provider = provider.clone();
                async move {
                    let texts: Vec<String> = group.iter().map(|t| t.prepared.clone()).collect();
                    let batch = self.backend.embed_texts(&texts).await?;
                    if batch.vectors.len() != group.len() {
                        return Err(Error::Embedding(format!(
                            "provider returned {} vectors for {} notes",
                            batch.vectors.len(),
                            group.len()
                        )));
                    }

                    let records: Vec<StoredEmbedding> = group
                        .iter()
                        .zip(batch.vectors)
                        .map(|(task, vector)| {
                            StoredEmbedding::new(
                                task.id.clone(),
                                task.path.clone(),
                                task.title.clone(),
                                task.hash.clone(),
                                vector.values().to_vec(),
                                batch.model.clone(),
                                provider.clone(),
                            )
                        })
                        .collect::<Result<_>>()?;

                    self.store.save_batch(records).await?;
                    Ok(group.into_iter().map(|t| t.id).collect::<Vec<_>>())
                }
            },
            |processed, _pending_total| progress(skipped + processed, total),
        )
        .await;

        self.store.flush().await?;

        let errors: Vec<BatchFailure> = outcome
            .failures
            .iter()
            .map(|f| BatchFailure {
                batch_index: f.group_index,
                note_ids: batch_ids.get(f.group_index).cloned().unwrap_or_default(),
                error: f.error.clone(),
            })
            .collect();
        let failed: usize = errors.iter().map(|e| e.note_ids.len()).sum();

        let report = EmbedReport {
            total,
            embedded: outcome.results.len(),
            skipped,
            failed,
            errors,
            cancelled: outcome.cancelled,
        };
        info!(
            embedded = report.embedded,
            skipped = report.skipped,
            failed = report.failed,
            cancelled = report.cancelled,
            "Embed-all run finished"
        );
        Ok(report)
    }

    /// Find notes with vectors similar to the given note's stored vector.
    ///
    /// A note with no stored embedding contributes nothing to semantic
    /// recommendations, so a missing record returns an empty list rather
    /// than an error.
    #[instrument(skip(self, opts), fields(subsystem = "embed", component = "service", op = "find_similar_notes", note_id = %id))]
    pub async fn find_similar_notes(
        &self,
        id: &NoteId,
        opts: &FindSimilarOptions,
    ) -> Result<Vec<SimilarHit>> {
        let Some(record) = self.store.get(id).await? else {
            debug!("No stored embedding, returning empty result");
            return Ok(Vec::new());
        };

        let mut opts = opts.clone();
        if !opts.exclude_ids.contains(id) {
            opts.exclude_ids.push(id.clone());
        }
        self.store.find_similar(&record.vector, &opts).await
    }
}
