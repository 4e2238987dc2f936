//! Structured logging schema and field name constants for notemesh.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log tooling can query by standardized names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (similarity hits) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from a host command into sub-calls.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "core", "inference", "store", "embed", "recommend", "host"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "ollama", "openai", "local_store", "engine", "reason"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "embed_texts", "recommend", "embed_all", "find_similar"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note identifier being operated on.
pub const NOTE_ID: &str = "note_id";

/// Index of the batch group being processed.
pub const BATCH_INDEX: &str = "batch_index";

/// Retry attempt number (0-based).
pub const ATTEMPT: &str = "attempt";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Computed backoff delay in milliseconds.
pub const DELAY_MS: &str = "delay_ms";

/// Number of results returned by a lookup or similarity scan.
pub const RESULT_COUNT: &str = "result_count";

/// Number of input texts sent to an embedding model.
pub const INPUT_COUNT: &str = "input_count";

// ─── Recommendation fields ─────────────────────────────────────────────────

/// Strategy contributing a partial result ("tags", "graph", "semantic").
pub const STRATEGY: &str = "strategy";

/// Number of candidates in the working map after a strategy ran.
pub const CANDIDATE_COUNT: &str = "candidate_count";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Provider id ("ollama", "openai", "mock").
pub const PROVIDER: &str = "provider";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Whether a cached value was served.
pub const CACHE_HIT: &str = "cache_hit";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
