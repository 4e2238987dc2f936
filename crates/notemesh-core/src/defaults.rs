//! Centralized default constants for notemesh.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates reference these constants instead of defining their
//! own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Hard character budget for text sent to an embedding provider.
///
/// A fixed character cut keeps requests inside provider token limits
/// deterministically, without per-provider tokenization.
pub const EMBED_CONTENT_MAX_CHARS: usize = 15_000;

/// Marker appended when note content is truncated at the character budget.
pub const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Number of notes vectorized per provider call during bulk embedding.
pub const EMBED_BATCH_SIZE: usize = 10;

/// Pause between embedding batch groups in milliseconds, to smooth
/// request rate against provider rate limits.
pub const EMBED_BATCH_DELAY_MS: u64 = 200;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Default OpenAI API base URL.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default OpenAI embedding model.
pub const OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default OpenAI embedding dimension for text-embedding-3-small.
pub const OPENAI_EMBED_DIMENSION: usize = 1536;

/// Default OpenAI chat model for connection-reason classification.
pub const OPENAI_GEN_MODEL: &str = "gpt-4o-mini";

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// RETRY / BACKOFF
// =============================================================================

/// Default maximum retry count for failed provider calls.
pub const RETRY_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Ceiling on any computed backoff delay in milliseconds.
pub const RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Fraction of the computed delay added as random jitter (0.0-1.0).
pub const RETRY_JITTER_FACTOR: f64 = 0.25;

/// Buffer added on top of a server-supplied retry-after hint, in
/// milliseconds. Retrying exactly at the hinted instant tends to land
/// inside the same rate-limit window.
pub const RETRY_AFTER_BUFFER_MS: u64 = 500;

// =============================================================================
// RECOMMENDATION SCORING (Tier 2 — Algorithm Parameters)
// =============================================================================

/// Score assigned to a candidate connected to the source by a direct
/// graph link. A direct link is treated as strong corroborating evidence
/// regardless of edge weight; this is a deliberate simplification, not a
/// weighted edge score.
pub const GRAPH_LINK_SCORE: f32 = 0.8;

/// Corroboration weight applied to semantic similarity when a candidate
/// already has evidence from another signal. Semantic similarity pushes an
/// existing score up but never replaces stronger independent evidence.
pub const SEMANTIC_BOOST_WEIGHT: f32 = 0.3;

/// Minimum merged score for a candidate to appear in results.
pub const RECOMMEND_MIN_SCORE: f32 = 0.3;

/// Maximum number of recommendations returned per request.
pub const RECOMMEND_MAX_RESULTS: usize = 10;

/// Minimum cosine similarity for the semantic strategy to consider a hit.
pub const SEMANTIC_THRESHOLD: f32 = 0.5;

/// Top-K similar vectors fetched by the semantic strategy.
pub const SEMANTIC_LIMIT: usize = 20;

// =============================================================================
// STORE
// =============================================================================

/// Version stamp written into the local store's metadata block.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Seconds the read-only store serves its cache before re-reading the
/// backing index.
pub const READONLY_REFRESH_TTL_SECS: u64 = 60;

// =============================================================================
// CONNECTION REASONS
// =============================================================================

/// Days a cached connection classification stays valid.
pub const REASON_CACHE_TTL_DAYS: i64 = 7;

/// Maximum length of a connection reason string in characters.
pub const REASON_MAX_CHARS: usize = 300;

/// Maximum tokens requested from the model for a classification reply.
pub const REASON_MAX_TOKENS: u32 = 200;

/// Sampling temperature for classification calls. Low because the output
/// must stay inside a fixed label set.
pub const REASON_TEMPERATURE: f32 = 0.2;

// =============================================================================
// NOTES
// =============================================================================

/// Maximum tag name length in characters.
pub const TAG_NAME_MAX_LENGTH: usize = 100;

/// Length of a canonical note identifier (12-digit timestamp).
pub const NOTE_ID_LENGTH: usize = 12;
