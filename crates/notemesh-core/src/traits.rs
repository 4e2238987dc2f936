//! Core traits for notemesh abstractions.
//!
//! These traits define the seams between this core and its external
//! collaborators (the host's note index, its link graph, the inference
//! providers) and between the core's own layers (embedding store), enabling
//! pluggable implementations and testability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::Embedding;
use crate::error::Result;
use crate::models::{FindSimilarOptions, Note, NoteId, SimilarHit, StoreStats, StoredEmbedding};

// =============================================================================
// NOTE INDEX (external collaborator)
// =============================================================================

/// Read-only view of the host's file-and-metadata index.
///
/// Implementations must return normalized [`Note`] value objects; missing
/// notes are `None`/empty results, never errors.
#[async_trait]
pub trait NoteIndex: Send + Sync {
    /// Look up a note by its identifier.
    async fn find_by_id(&self, id: &NoteId) -> Result<Option<Note>>;

    /// Look up a note by its vault-relative path.
    async fn find_by_path(&self, path: &str) -> Result<Option<Note>>;

    /// Find all notes carrying at least one of the given normalized tags.
    async fn find_by_tags(&self, tags: &[String]) -> Result<Vec<Note>>;

    /// Enumerate every note in the vault.
    async fn find_all(&self) -> Result<Vec<Note>>;
}

// =============================================================================
// GRAPH INDEX (external collaborator)
// =============================================================================

/// A node in the host's link graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NoteId,
    pub title: String,
    pub path: String,
}

/// A directed edge in the host's link graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: NoteId,
    pub to: NoteId,
}

/// Node/edge counts for diagnostics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

/// Read-only view of the host's explicit link graph.
#[async_trait]
pub trait GraphIndex: Send + Sync {
    /// Nodes directly connected to the given note (either direction).
    async fn find_connected(&self, id: &NoteId) -> Result<Vec<GraphNode>>;

    /// Look up a single node.
    async fn find_node(&self, id: &NoteId) -> Result<Option<GraphNode>>;

    /// All nodes in the graph.
    async fn all_nodes(&self) -> Result<Vec<GraphNode>>;

    /// All edges in the graph.
    async fn all_edges(&self) -> Result<Vec<GraphEdge>>;

    /// Node/edge counts.
    async fn stats(&self) -> Result<GraphStats>;
}

/// Default graph implementation returning empty results everywhere.
///
/// Selected by configuration when the host provides no link graph; the
/// graph strategy then degrades to contributing nothing.
pub struct NullGraphIndex;

#[async_trait]
impl GraphIndex for NullGraphIndex {
    async fn find_connected(&self, _id: &NoteId) -> Result<Vec<GraphNode>> {
        Ok(Vec::new())
    }

    async fn find_node(&self, _id: &NoteId) -> Result<Option<GraphNode>> {
        Ok(None)
    }

    async fn all_nodes(&self) -> Result<Vec<GraphNode>> {
        Ok(Vec::new())
    }

    async fn all_edges(&self) -> Result<Vec<GraphEdge>> {
        Ok(Vec::new())
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats::default())
    }
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Result of a batch embedding call.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// One embedding per input text, in input order.
    pub vectors: Vec<Embedding>,
    pub model: String,
    pub total_tokens: Option<u32>,
}

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// The output preserves input order; backends whose transport returns
    /// indexed results must re-sort by index before returning.
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingBatch>;

    /// Generate one embedding for a single text.
    async fn embed_text(&self, text: &str) -> Result<Embedding> {
        let batch = self.embed_texts(&[text.to_string()]).await?;
        batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::Error::Embedding("provider returned no vector".into()))
    }

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;

    /// Whether the backend has everything it needs to make calls
    /// (endpoint, credentials). Static check, no network round-trip.
    fn is_configured(&self) -> bool;
}

/// Result of a completion call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub token_count: Option<u32>,
}

/// Tuning for a single completion call.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the provider for guaranteed-JSON output where supported.
    pub json: bool,
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<Completion>;

    /// Generate text with system context.
    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
        opts: &GenerationOptions,
    ) -> Result<Completion>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;

    /// Whether the backend has everything it needs to make calls.
    fn is_configured(&self) -> bool;
}

/// Combined inference backend supporting both embedding and generation.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + GenerationBackend {
    /// Live round-trip check that the endpoint is reachable and the
    /// credentials are accepted.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// EMBEDDING STORE TRAITS
// =============================================================================

/// Persistence for note embeddings, keyed by note id.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Upsert one record. Saving the same id twice replaces, never
    /// duplicates.
    async fn save(&self, record: StoredEmbedding) -> Result<()>;

    /// Upsert a batch of records.
    async fn save_batch(&self, records: Vec<StoredEmbedding>) -> Result<()>;

    /// Fetch the stored record for a note, if any.
    async fn get(&self, id: &NoteId) -> Result<Option<StoredEmbedding>>;

    /// The single authoritative staleness check: true if no record exists
    /// or the stored content hash differs from `current_hash`.
    async fn is_stale(&self, id: &NoteId, current_hash: &str) -> Result<bool>;

    /// Linear scan over all stored vectors by cosine similarity.
    ///
    /// Keeps hits at or above the threshold that are not excluded, sorted
    /// by similarity descending (stable, so equal scores preserve
    /// insertion order), truncated to the limit.
    async fn find_similar(
        &self,
        query: &[f32],
        opts: &FindSimilarOptions,
    ) -> Result<Vec<SimilarHit>>;

    /// Remove one record. Removing a missing id is a no-op.
    async fn delete(&self, id: &NoteId) -> Result<()>;

    /// Remove every record, returning how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Store statistics.
    async fn stats(&self) -> Result<StoreStats>;

    /// Durability boundary: persist any buffered mutations. Callers must
    /// flush after a batch of writes before relying on the data surviving
    /// a restart.
    async fn flush(&self) -> Result<()>;
}

/// Optional extended capability for stores backed by an external index.
///
/// Callers needing refresh behavior take this as an explicitly typed
/// dependency instead of probing the base store for extra methods.
#[async_trait]
pub trait RefreshableEmbeddingStore: EmbeddingStore {
    /// Re-read the backing index if the cache TTL has elapsed, or
    /// unconditionally when `force` is set.
    async fn refresh(&self, force: bool) -> Result<()>;

    /// Human-readable description of the backing source.
    fn source_info(&self) -> String;
}

/// Backing index for a read-only store consuming externally-generated
/// embeddings.
#[async_trait]
pub trait EmbeddingSource: Send + Sync {
    /// Load every record from the backing index.
    async fn load(&self) -> Result<Vec<StoredEmbedding>>;

    /// Human-readable description of the source.
    fn description(&self) -> String;
}
