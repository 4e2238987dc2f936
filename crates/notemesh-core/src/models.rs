//! Core data models for notemesh.
//!
//! Value objects validate their invariants at construction time and are
//! immutable afterwards. Expected misses ("no embedding for this note")
//! are `Option`/empty-list returns on the read paths, never errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tags::normalize_tags;

// =============================================================================
// NOTE IDENTITY
// =============================================================================

/// Canonical note identifier: a 12-digit timestamp (`YYYYMMDDHHMM`).
///
/// The host index derives it from the note's file-name prefix or creation
/// time; this core only enforces the format. The content-path-hash scheme
/// seen in some vaults is intentionally not supported; one canonical
/// scheme per system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Validate and wrap an identifier. Must be exactly 12 ASCII digits.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.len() != crate::defaults::NOTE_ID_LENGTH || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Validation(format!(
                "note id must be a 12-digit timestamp, got '{}'",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

// =============================================================================
// NOTE
// =============================================================================

/// A note projected from the host's file-and-metadata index.
///
/// Constructed on demand each time a note is read; never persisted by this
/// core. Tags are normalized before storage, so downstream comparisons are
/// plain string equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub path: String,
    pub content: Option<String>,
    tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Construct a note, validating required fields and normalizing tags.
    pub fn new(
        id: NoteId,
        title: impl Into<String>,
        path: impl Into<String>,
        raw_tags: Vec<String>,
    ) -> Result<Self> {
        let title = title.into();
        let path = path.into();
        if title.trim().is_empty() {
            return Err(Error::Validation("note title must not be empty".to_string()));
        }
        if path.trim().is_empty() {
            return Err(Error::Validation("note path must not be empty".to_string()));
        }
        Ok(Self {
            id,
            title,
            path,
            content: None,
            tags: normalize_tags(raw_tags),
            created_at: None,
            modified_at: None,
        })
    }

    /// Attach raw content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Attach creation/modification timestamps.
    pub fn with_timestamps(
        mut self,
        created_at: Option<DateTime<Utc>>,
        modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created_at;
        self.modified_at = modified_at;
        self
    }

    /// The normalized tag set (lower-cased, deduplicated, order-preserving).
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }
}

// =============================================================================
// STORED EMBEDDING
// =============================================================================

/// The persisted form of a note's embedding.
///
/// Created or overwritten after successful vector generation; never mutated
/// in place. The content hash records exactly which note content produced
/// the vector; any mismatch with the current hash marks the record stale.
///
/// Serialized camelCase to stay compatible with the on-disk document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEmbedding {
    pub note_id: NoteId,
    pub note_path: String,
    pub title: String,
    pub content_hash: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub provider: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredEmbedding {
    /// Build a record, deriving `dimensions` from the vector.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        note_id: NoteId,
        note_path: impl Into<String>,
        title: impl Into<String>,
        content_hash: impl Into<String>,
        vector: Vec<f32>,
        model: impl Into<String>,
        provider: impl Into<String>,
    ) -> Result<Self> {
        if vector.is_empty() {
            return Err(Error::Validation(
                "stored embedding vector must not be empty".to_string(),
            ));
        }
        let dimensions = vector.len();
        let now = Utc::now();
        Ok(Self {
            note_id,
            note_path: note_path.into(),
            title: title.into(),
            content_hash: content_hash.into(),
            vector,
            model: model.into(),
            provider: provider.into(),
            dimensions,
            created_at: now,
            updated_at: now,
        })
    }
}

/// One hit from a vector similarity scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarHit {
    pub note_id: NoteId,
    pub note_path: String,
    pub title: String,
    pub similarity: f32,
}

/// Options for a similarity scan over the store.
#[derive(Debug, Clone)]
pub struct FindSimilarOptions {
    /// Maximum hits returned.
    pub limit: usize,
    /// Minimum cosine similarity for inclusion.
    pub threshold: f32,
    /// Note ids excluded from the scan (typically the query note itself).
    pub exclude_ids: Vec<NoteId>,
}

impl Default for FindSimilarOptions {
    fn default() -> Self {
        Self {
            limit: crate::defaults::SEMANTIC_LIMIT,
            threshold: crate::defaults::SEMANTIC_THRESHOLD,
            exclude_ids: Vec::new(),
        }
    }
}

/// Store statistics surfaced to the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub count: usize,
    pub last_updated: Option<DateTime<Utc>>,
    /// Rough in-memory footprint of the stored vectors, in bytes.
    pub estimated_size_bytes: u64,
}

// =============================================================================
// RECOMMENDATIONS
// =============================================================================

/// One recommended note with its merged evidence.
///
/// Reasons accumulate as strategies contribute evidence; they are never
/// overwritten, and the same reason is never appended twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub note_id: NoteId,
    pub title: String,
    pub path: String,
    pub score: f32,
    pub reasons: Vec<String>,
    pub matched_tags: Vec<String>,
}

impl RecommendationItem {
    pub fn new(note_id: NoteId, title: impl Into<String>, path: impl Into<String>, score: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&score) {
            return Err(Error::Validation(format!(
                "recommendation score must be in [0,1], got {}",
                score
            )));
        }
        Ok(Self {
            note_id,
            title: title.into(),
            path: path.into(),
            score,
            reasons: Vec::new(),
            matched_tags: Vec::new(),
        })
    }

    /// Append a reason unless an identical one is already recorded.
    pub fn add_reason(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    /// Whether any recorded reason starts with the given prefix.
    pub fn has_reason_with_prefix(&self, prefix: &str) -> bool {
        self.reasons.iter().any(|r| r.starts_with(prefix))
    }
}

/// Ranked result of one recommendation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub source_id: Option<NoteId>,
    pub items: Vec<RecommendationItem>,
}

// =============================================================================
// CONNECTION CLASSIFICATION
// =============================================================================

/// The five fixed relationship labels a note pair can be classified into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Target develops or elaborates the source's idea.
    Extends,
    /// Target provides evidence or argument for the source.
    Supports,
    /// Target disputes or conflicts with the source.
    Contradicts,
    /// Target is a concrete instance of the source's concept.
    ExampleOf,
    /// Related, but none of the above fits.
    #[default]
    Related,
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extends => write!(f, "extends"),
            Self::Supports => write!(f, "supports"),
            Self::Contradicts => write!(f, "contradicts"),
            Self::ExampleOf => write!(f, "example_of"),
            Self::Related => write!(f, "related"),
        }
    }
}

impl ConnectionKind {
    /// Parse a label from model output, coercing anything unknown to the
    /// default label rather than failing the request.
    pub fn from_model_label(s: &str) -> Self {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "extends" | "builds_on" => Self::Extends,
            "supports" => Self::Supports,
            "contradicts" => Self::Contradicts,
            "example_of" | "example" => Self::ExampleOf,
            "related" => Self::Related,
            _ => Self::default(),
        }
    }
}

/// A classified relationship between two notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionReason {
    pub kind: ConnectionKind,
    pub reason: String,
}

impl ConnectionReason {
    /// Build a classification, trimming the reason and enforcing the
    /// length budget.
    pub fn new(kind: ConnectionKind, reason: impl Into<String>) -> Result<Self> {
        let reason = reason.into().trim().to_string();
        if reason.is_empty() {
            return Err(Error::Validation(
                "connection reason must not be empty".to_string(),
            ));
        }
        if reason.chars().count() > crate::defaults::REASON_MAX_CHARS {
            return Err(Error::Validation(format!(
                "connection reason exceeds {} chars",
                crate::defaults::REASON_MAX_CHARS
            )));
        }
        Ok(Self { kind, reason })
    }

    /// The fallback classification used when the model's reply cannot be
    /// parsed or carries an unusable reason.
    pub fn fallback() -> Self {
        Self {
            kind: ConnectionKind::default(),
            reason: "These notes appear to be related.".to_string(),
        }
    }
}

// =============================================================================
// EMBEDDING RUN REPORTS
// =============================================================================

/// Outcome of embedding a single note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedStatus {
    /// A new vector was generated and saved.
    Embedded,
    /// The stored vector was fresh; nothing was done.
    Skipped,
}

/// A batch group that failed after exhausting retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub note_ids: Vec<NoteId>,
    pub error: String,
}

/// Best-effort result of an embed-all run.
///
/// `failed` counts items whose batch was attempted and exhausted its
/// retries, as distinct from items never attempted because the run was
/// cancelled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedReport {
    pub total: usize,
    pub embedded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<BatchFailure>,
    pub cancelled: bool,
}
