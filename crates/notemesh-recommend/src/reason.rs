//! Connection reason service: asks an LLM to classify the relationship
//! between two notes into one of the five fixed labels.
//!
//! Classification costs a model call, so results are cached per ordered
//! note pair for a fixed TTL, and concurrent requests for the same pair
//! share one in-flight call instead of issuing duplicates. Any parse
//! failure or unusable label from the model falls back to the default
//! classification rather than failing the request.
//!
//! The cache is owned by this service instance: it starts empty (or
//! hydrated from a snapshot) and can be serialized back to a snapshot
//! before shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use notemesh_core::defaults;
use notemesh_core::{
    ConnectionKind, ConnectionReason, Error, GenerationBackend, GenerationOptions, Note, NoteId,
    Result,
};
use notemesh_inference::{with_retry, RetryOptions};

/// Characters of each note's content included in the classification prompt.
const PROMPT_CONTENT_CHARS: usize = 2_000;

const SYSTEM_PROMPT: &str = "You classify the relationship between two notes from a personal \
knowledge base. Reply with JSON: {\"type\": \"<label>\", \"reason\": \"<one sentence>\"}. \
The label must be one of: extends, supports, contradicts, example_of, related.";

/// Configuration for the connection reason service.
#[derive(Debug, Clone)]
pub struct ReasonConfig {
    /// How long a cached classification stays valid.
    pub cache_ttl: Duration,
    /// Token budget for the model's reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Retry policy for the model call.
    pub retry: RetryOptions,
}

impl Default for ReasonConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::days(defaults::REASON_CACHE_TTL_DAYS),
            max_tokens: defaults::REASON_MAX_TOKENS,
            temperature: defaults::REASON_TEMPERATURE,
            retry: RetryOptions::default(),
        }
    }
}

impl ReasonConfig {
    /// Set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

/// Cache key: the ordered (source, target) pair. Classification is
/// directional, so (a, b) and (b, a) are distinct entries.
type PairKey = (NoteId, NoteId);

#[derive(Debug, Clone)]
struct CachedReason {
    reason: ConnectionReason,
    cached_at: DateTime<Utc>,
}

/// One entry of a serialized cache snapshot.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotEntry {
    source_id: NoteId,
    target_id: NoteId,
    kind: ConnectionKind,
    reason: String,
    cached_at: DateTime<Utc>,
}

type SharedClassify = Shared<BoxFuture<'static, std::result::Result<ConnectionReason, String>>>;

/// Classifies note pairs with caching and in-flight de-duplication.
pub struct ConnectionReasonService {
    backend: Arc<dyn GenerationBackend>,
    config: ReasonConfig,
    cache: Mutex<HashMap<PairKey, CachedReason>>,
    inflight: Mutex<HashMap<PairKey, SharedClassify>>,
}

impl ConnectionReasonService {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: ReasonConfig) -> Self {
        Self {
            backend,
            config,
            cache: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Classify the relationship from `source` to `target`.
    #[instrument(skip(self, source, target), fields(subsystem = "recommend", component = "reason", op = "classify", note_id = %source.id))]
    pub async fn classify(&self, source: &Note, target: &Note) -> Result<ConnectionReason> {
        if !self.backend.is_configured() {
            return Err(Error::NotConfigured(
                "generation provider is not configured".to_string(),
            ));
        }

        let key: PairKey = (source.id.clone(), target.id.clone());

        // cache check, evicting an expired entry in place
        {
            let mut cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&key) {
                if Utc::now() - cached.cached_at < self.config.cache_ttl {
                    debug!(cache_hit = true, "Serving cached classification");
                    return Ok(cached.reason.clone());
                }
                cache.remove(&key);
            }
        }

        // in-flight de-duplication: the second caller awaits the first's
        // shared future instead of issuing a duplicate model call
        let fut = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&key) {
                Some(existing) => {
                    debug!("Joining in-flight classification");
                    existing.clone()
                }
                None => {
                    let fut = Self::classify_uncached(
                        self.backend.clone(),
                        self.config.clone(),
                        prompt_for(source, target),
                    )
                    .boxed()
                    .shared();
                    inflight.insert(key.clone(), fut.clone());
                    fut
                }
            }
        };

        let outcome = fut.await;
        self.inflight.lock().await.remove(&key);

        match outcome {
            Ok(reason) => {
                self.cache.lock().await.insert(
                    key,
                    CachedReason {
                        reason: reason.clone(),
                        cached_at: Utc::now(),
                    },
                );
                Ok(reason)
            }
            Err(message) => Err(Error::Inference(message)),
        }
    }

    /// The retried model call plus response parsing. Owns everything it
    /// touches so the future can be shared across callers.
    async fn classify_uncached(
        backend: Arc<dyn GenerationBackend>,
        config: ReasonConfig,
        prompt: String,
    ) -> std::result::Result<ConnectionReason, String> {
        let opts = GenerationOptions {
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
            json: true,
        };

        let completion = with_retry("classify_connection", &config.retry, || {
            backend.generate_with_system(SYSTEM_PROMPT, &prompt, &opts)
        })
        .await
        .map_err(|e| e.to_string())?;

        Ok(parse_classification(&completion.text))
    }

    /// Serialize unexpired cache entries for persistence across shutdown.
    pub async fn snapshot(&self) -> Result<serde_json::Value> {
        let cache = self.cache.lock().await;
        let entries: Vec<SnapshotEntry> = cache
            .iter()
            .filter(|(_, v)| Utc::now() - v.cached_at < self.config.cache_ttl)
            .map(|((source_id, target_id), v)| SnapshotEntry {
                source_id: source_id.clone(),
                target_id: target_id.clone(),
                kind: v.reason.kind,
                reason: v.reason.reason.clone(),
                cached_at: v.cached_at,
            })
            .collect();
        Ok(serde_json::to_value(entries)?)
    }

    /// Hydrate the cache from a snapshot, dropping expired entries.
    pub async fn hydrate(&self, snapshot: serde_json::Value) -> Result<usize> {
        let entries: Vec<SnapshotEntry> = serde_json::from_value(snapshot)?;
        let mut cache = self.cache.lock().await;
        let mut loaded = 0;
        for entry in entries {
            if Utc::now() - entry.cached_at >= self.config.cache_ttl {
                continue;
            }
            let reason = match ConnectionReason::new(entry.kind, entry.reason) {
                Ok(reason) => reason,
                Err(e) => {
                    warn!(error = %e, "Dropping invalid snapshot entry");
                    continue;
                }
            };
            cache.insert(
                (entry.source_id, entry.target_id),
                CachedReason {
                    reason,
                    cached_at: entry.cached_at,
                },
            );
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Number of cached classifications.
    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

/// Build the user prompt from both notes' content previews.
fn prompt_for(source: &Note, target: &Note) -> String {
    let preview = |note: &Note| {
        let content = note.content.as_deref().unwrap_or_default();
        content.chars().take(PROMPT_CONTENT_CHARS).collect::<String>()
    };
    format!(
        "Note A (\"{}\"):\n{}\n\nNote B (\"{}\"):\n{}\n\nHow does Note B relate to Note A?",
        source.title,
        preview(source),
        target.title,
        preview(target),
    )
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    reason: String,
}

/// Parse the model's JSON reply, coercing anything unusable to the
/// fallback classification.
fn parse_classification(text: &str) -> ConnectionReason {
    let reply: ModelReply = match serde_json::from_str(text.trim()) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Unparseable classification reply, using fallback");
            return ConnectionReason::fallback();
        }
    };

    let kind = ConnectionKind::from_model_label(&reply.kind);
    let reason: String = reply
        .reason
        .trim()
        .chars()
        .take(defaults::REASON_MAX_CHARS)
        .collect();

    match ConnectionReason::new(kind, reason) {
        Ok(reason) => reason,
        Err(_) => ConnectionReason::fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notemesh_core::testing::note;
    use notemesh_inference::MockInferenceBackend;

    fn fast_config() -> ReasonConfig {
        ReasonConfig::default()
            .with_retry(RetryOptions::default().with_max_retries(0).with_base_delay_ms(1))
    }

    fn pair() -> (Note, Note) {
        (
            note("202401010001", "Source", &[]).with_content("virtue ethics overview"),
            note("202401010002", "Target", &[]).with_content("aristotle on habit"),
        )
    }

    #[tokio::test]
    async fn test_classify_parses_label_and_reason() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(r#"{"type": "supports", "reason": "cites the same argument"}"#);
        let service = ConnectionReasonService::new(Arc::new(backend), fast_config());
        let (source, target) = pair();

        let result = service.classify(&source, &target).await.unwrap();
        assert_eq!(result.kind, ConnectionKind::Supports);
        assert_eq!(result.reason, "cites the same argument");
    }

    #[tokio::test]
    async fn test_classify_caches_per_ordered_pair() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(r#"{"type": "related", "reason": "same topic"}"#);
        let mock = backend.clone();
        let service = ConnectionReasonService::new(Arc::new(backend), fast_config());
        let (source, target) = pair();

        service.classify(&source, &target).await.unwrap();
        service.classify(&source, &target).await.unwrap();
        assert_eq!(mock.generate_call_count(), 1);

        // reversed pair is a distinct cache entry
        service.classify(&target, &source).await.unwrap();
        assert_eq!(mock.generate_call_count(), 2);
        assert_eq!(service.cache_len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_call() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(r#"{"type": "extends", "reason": "develops the idea"}"#);
        let mock = backend.clone();
        let service = Arc::new(ConnectionReasonService::new(Arc::new(backend), fast_config()));
        let (source, target) = pair();

        let (a, b) = tokio::join!(
            service.classify(&source, &target),
            service.classify(&source, &target)
        );
        assert_eq!(a.unwrap().kind, ConnectionKind::Extends);
        assert_eq!(b.unwrap().kind, ConnectionKind::Extends);
        assert_eq!(mock.generate_call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_label_coerced_to_default() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(r#"{"type": "synergizes", "reason": "some reason"}"#);
        let service = ConnectionReasonService::new(Arc::new(backend), fast_config());
        let (source, target) = pair();

        let result = service.classify(&source, &target).await.unwrap();
        assert_eq!(result.kind, ConnectionKind::Related);
        assert_eq!(result.reason, "some reason");
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let backend = MockInferenceBackend::new().with_fixed_response("sorry, I cannot do that");
        let service = ConnectionReasonService::new(Arc::new(backend), fast_config());
        let (source, target) = pair();

        let result = service.classify(&source, &target).await.unwrap();
        assert_eq!(result, ConnectionReason::fallback());
    }

    #[tokio::test]
    async fn test_empty_reason_falls_back() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(r#"{"type": "supports", "reason": "  "}"#);
        let service = ConnectionReasonService::new(Arc::new(backend), fast_config());
        let (source, target) = pair();

        let result = service.classify(&source, &target).await.unwrap();
        assert_eq!(result, ConnectionReason::fallback());
    }

    #[tokio::test]
    async fn test_overlong_reason_truncated_not_rejected() {
        let long = "x".repeat(defaults::REASON_MAX_CHARS * 2);
        let backend = MockInferenceBackend::new()
            .with_fixed_response(format!(r#"{{"type": "supports", "reason": "{}"}}"#, long));
        let service = ConnectionReasonService::new(Arc::new(backend), fast_config());
        let (source, target) = pair();

        let result = service.classify(&source, &target).await.unwrap();
        assert_eq!(result.kind, ConnectionKind::Supports);
        assert_eq!(result.reason.chars().count(), defaults::REASON_MAX_CHARS);
    }

    #[tokio::test]
    async fn test_expired_cache_entry_reclassifies() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(r#"{"type": "related", "reason": "same topic"}"#);
        let mock = backend.clone();
        let config = fast_config().with_cache_ttl(Duration::zero());
        let service = ConnectionReasonService::new(Arc::new(backend), config);
        let (source, target) = pair();

        service.classify(&source, &target).await.unwrap();
        service.classify(&source, &target).await.unwrap();
        assert_eq!(mock.generate_call_count(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_hard_failure() {
        let backend = MockInferenceBackend::new().with_unconfigured();
        let service = ConnectionReasonService::new(Arc::new(backend), fast_config());
        let (source, target) = pair();

        let result = service.classify(&source, &target).await;
        assert!(matches!(result, Err(Error::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_snapshot_and_hydrate_roundtrip() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(r#"{"type": "contradicts", "reason": "opposite conclusion"}"#);
        let service = ConnectionReasonService::new(Arc::new(backend), fast_config());
        let (source, target) = pair();

        service.classify(&source, &target).await.unwrap();
        let snapshot = service.snapshot().await.unwrap();

        // a fresh instance hydrated from the snapshot serves from cache
        let backend2 = MockInferenceBackend::new();
        let mock2 = backend2.clone();
        let restored = ConnectionReasonService::new(Arc::new(backend2), fast_config());
        let loaded = restored.hydrate(snapshot).await.unwrap();
        assert_eq!(loaded, 1);

        let result = restored.classify(&source, &target).await.unwrap();
        assert_eq!(result.kind, ConnectionKind::Contradicts);
        assert_eq!(mock2.generate_call_count(), 0);
    }

    #[test]
    fn test_parse_classification_variants() {
        let parsed = parse_classification(r#"{"type": "example_of", "reason": "a case study"}"#);
        assert_eq!(parsed.kind, ConnectionKind::ExampleOf);

        let parsed = parse_classification("not json at all");
        assert_eq!(parsed, ConnectionReason::fallback());

        let parsed = parse_classification(r#"{"type": "EXTENDS", "reason": "caps label"}"#);
        assert_eq!(parsed.kind, ConnectionKind::Extends);
    }

    #[test]
    fn test_prompt_includes_titles_and_previews() {
        let (source, target) = pair();
        let prompt = prompt_for(&source, &target);
        assert!(prompt.contains("Source"));
        assert!(prompt.contains("Target"));
        assert!(prompt.contains("virtue ethics overview"));
        assert!(prompt.contains("aristotle on habit"));
    }
}
