//! The recommendation engine: fuses tag-overlap, graph-adjacency, and
//! semantic-similarity signals into one ranked list.
//!
//! Pure request/response computation; no state survives between calls.
//! Strategies run sequentially because later merge steps read the partial
//! result map built by earlier ones. The only hard failure is a missing
//! source note; every per-strategy failure is logged and swallowed so the
//! result stays best-effort across the signals that did work.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use notemesh_core::defaults;
use notemesh_core::{
    matched_tags, Error, FindSimilarOptions, GraphIndex, Note, NoteId, NoteIndex,
    RecommendationItem, RecommendationResponse, Result,
};
use notemesh_embed::EmbeddingService;

/// Options for one recommendation request.
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    /// Maximum items returned.
    pub max_results: usize,
    /// Minimum merged score for inclusion.
    pub min_score: f32,
    /// Run the graph strategy.
    pub use_graph: bool,
    /// Run the semantic strategy (requires a ready embedding service).
    pub use_semantic: bool,
    /// Top-K similar vectors fetched by the semantic strategy.
    pub semantic_limit: usize,
    /// Minimum cosine similarity for a semantic hit.
    pub semantic_threshold: f32,
    /// Score assigned to directly-linked candidates.
    pub graph_link_score: f32,
    /// Corroboration weight for semantic similarity on candidates that
    /// already have evidence from another signal.
    pub semantic_boost_weight: f32,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            max_results: defaults::RECOMMEND_MAX_RESULTS,
            min_score: defaults::RECOMMEND_MIN_SCORE,
            use_graph: true,
            use_semantic: true,
            semantic_limit: defaults::SEMANTIC_LIMIT,
            semantic_threshold: defaults::SEMANTIC_THRESHOLD,
            graph_link_score: defaults::GRAPH_LINK_SCORE,
            semantic_boost_weight: defaults::SEMANTIC_BOOST_WEIGHT,
        }
    }
}

impl RecommendOptions {
    /// Create options from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `NOTEMESH_MAX_RESULTS` | `10` | Result list cap |
    /// | `NOTEMESH_MIN_SCORE` | `0.3` | Score floor |
    /// | `NOTEMESH_USE_GRAPH` | `true` | Enable graph strategy |
    /// | `NOTEMESH_USE_SEMANTIC` | `true` | Enable semantic strategy |
    /// | `NOTEMESH_SEMANTIC_THRESHOLD` | `0.5` | Similarity floor |
    pub fn from_env() -> Self {
        let mut opts = Self::default();

        if let Ok(v) = std::env::var("NOTEMESH_MAX_RESULTS") {
            if let Ok(n) = v.parse::<usize>() {
                opts.max_results = n.max(1);
            }
        }
        if let Ok(v) = std::env::var("NOTEMESH_MIN_SCORE") {
            if let Ok(s) = v.parse::<f32>() {
                opts.min_score = s.clamp(0.0, 1.0);
            }
        }
        if let Ok(v) = std::env::var("NOTEMESH_USE_GRAPH") {
            opts.use_graph = v != "false" && v != "0";
        }
        if let Ok(v) = std::env::var("NOTEMESH_USE_SEMANTIC") {
            opts.use_semantic = v != "false" && v != "0";
        }
        if let Ok(v) = std::env::var("NOTEMESH_SEMANTIC_THRESHOLD") {
            if let Ok(s) = v.parse::<f32>() {
                opts.semantic_threshold = s.clamp(0.0, 1.0);
            }
        }
        opts
    }

    /// Set the result cap.
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max.max(1);
        self
    }

    /// Set the score floor.
    pub fn with_min_score(mut self, min: f32) -> Self {
        self.min_score = min.clamp(0.0, 1.0);
        self
    }

    /// Enable or disable the graph strategy.
    pub fn with_graph(mut self, enabled: bool) -> Self {
        self.use_graph = enabled;
        self
    }

    /// Enable or disable the semantic strategy.
    pub fn with_semantic(mut self, enabled: bool) -> Self {
        self.use_semantic = enabled;
        self
    }
}

/// Working map for one request: candidate items with O(1) lookup and
/// insertion-order iteration, so equal final scores rank deterministically.
#[derive(Default)]
struct CandidateMap {
    items: Vec<RecommendationItem>,
    index: HashMap<NoteId, usize>,
}

impl CandidateMap {
    fn get_mut(&mut self, id: &NoteId) -> Option<&mut RecommendationItem> {
        match self.index.get(id).copied() {
            Some(i) => self.items.get_mut(i),
            None => None,
        }
    }

    fn insert(&mut self, item: RecommendationItem) {
        self.index.insert(item.note_id.clone(), self.items.len());
        self.items.push(item);
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn into_items(self) -> Vec<RecommendationItem> {
        self.items
    }
}

/// The `RecommendNotes` use case.
pub struct RecommendationEngine {
    notes: Arc<dyn NoteIndex>,
    graph: Arc<dyn GraphIndex>,
    embeddings: Option<Arc<EmbeddingService>>,
}

impl RecommendationEngine {
    pub fn new(
        notes: Arc<dyn NoteIndex>,
        graph: Arc<dyn GraphIndex>,
        embeddings: Option<Arc<EmbeddingService>>,
    ) -> Self {
        Self {
            notes,
            graph,
            embeddings,
        }
    }

    /// Produce ranked recommendations for a source note.
    ///
    /// Fails only when the source note does not exist.
    #[instrument(skip(self, opts), fields(subsystem = "recommend", component = "engine", op = "recommend", note_id = %source_id))]
    pub async fn recommend(
        &self,
        source_id: &NoteId,
        opts: &RecommendOptions,
    ) -> Result<RecommendationResponse> {
        let source = self
            .notes
            .find_by_id(source_id)
            .await?
            .ok_or_else(|| Error::NoteNotFound(source_id.clone()))?;

        let mut candidates = CandidateMap::default();

        self.apply_tag_strategy(&source, &mut candidates).await;
        debug!(
            strategy = "tags",
            candidate_count = candidates.len(),
            "Strategy applied"
        );

        if opts.use_graph {
            self.apply_graph_strategy(&source, opts, &mut candidates)
                .await;
            debug!(
                strategy = "graph",
                candidate_count = candidates.len(),
                "Strategy applied"
            );
        }

        if opts.use_semantic {
            self.apply_semantic_strategy(&source, opts, &mut candidates)
                .await;
            debug!(
                strategy = "semantic",
                candidate_count = candidates.len(),
                "Strategy applied"
            );
        }

        let mut items: Vec<RecommendationItem> = candidates
            .into_items()
            .into_iter()
            // the source never recommends itself, even if a strategy
            // slipped it in
            .filter(|item| &item.note_id != source_id)
            .filter(|item| item.score >= opts.min_score)
            .collect();

        // stable sort: equal scores keep insertion order
        items.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        items.truncate(opts.max_results);

        debug!(result_count = items.len(), "Recommendation complete");
        Ok(RecommendationResponse {
            source_id: Some(source_id.clone()),
            items,
        })
    }

    /// Tag overlap: `score = |matched| / max(|source_tags|, 1)`.
    /// Always runs; a source with no tags contributes nothing.
    async fn apply_tag_strategy(&self, source: &Note, candidates: &mut CandidateMap) {
        if !source.has_tags() {
            return;
        }

        let found = match self.notes.find_by_tags(source.tags()).await {
            Ok(found) => found,
            Err(e) => {
                warn!(strategy = "tags", error = %e, "Strategy failed, skipping");
                return;
            }
        };

        let source_tags = source.tags();
        for note in found {
            if note.id == source.id {
                continue;
            }
            let matched = matched_tags(source_tags, note.tags());
            if matched.is_empty() {
                continue;
            }
            let score = matched.len() as f32 / source_tags.len().max(1) as f32;
            let reason = format!("shared tags: {}", matched.join(", "));

            match candidates.get_mut(&note.id) {
                Some(existing) => {
                    existing.score = existing.score.max(score);
                    if !existing.has_reason_with_prefix("shared tags") {
                        existing.add_reason(reason);
                    }
                    for tag in matched {
                        if !existing.matched_tags.contains(&tag) {
                            existing.matched_tags.push(tag);
                        }
                    }
                }
                None => {
                    match RecommendationItem::new(note.id.clone(), &note.title, &note.path, score) {
                        Ok(mut item) => {
                            item.add_reason(reason);
                            item.matched_tags = matched;
                            candidates.insert(item);
                        }
                        Err(e) => warn!(note_id = %note.id, error = %e, "Dropping invalid candidate"),
                    }
                }
            }
        }
    }

    /// Graph adjacency: every directly-linked note gets the fixed link
    /// score. A direct link is strong corroborating evidence regardless
    /// of edge weight.
    async fn apply_graph_strategy(
        &self,
        source: &Note,
        opts: &RecommendOptions,
        candidates: &mut CandidateMap,
    ) {
        let connected = match self.graph.find_connected(&source.id).await {
            Ok(connected) => connected,
            Err(e) => {
                warn!(strategy = "graph", error = %e, "Strategy failed, skipping");
                return;
            }
        };

        for node in connected {
            if node.id == source.id {
                continue;
            }
            match candidates.get_mut(&node.id) {
                Some(existing) => {
                    existing.score = existing.score.max(opts.graph_link_score);
                    if !existing.has_reason_with_prefix("direct link") {
                        existing.add_reason("direct link");
                    }
                }
                None => {
                    match RecommendationItem::new(
                        node.id.clone(),
                        &node.title,
                        &node.path,
                        opts.graph_link_score,
                    ) {
                        Ok(mut item) => {
                            item.add_reason("direct link");
                            candidates.insert(item);
                        }
                        Err(e) => warn!(note_id = %node.id, error = %e, "Dropping invalid candidate"),
                    }
                }
            }
        }
    }

    /// Semantic similarity: corroborates existing evidence with a bounded
    /// boost, or stands alone for candidates no other signal found.
    ///
    /// `boosted = min(1, existing + similarity * boost_weight)`, then
    /// `max(existing, boosted)`. Similarity pushes a score up but never
    /// replaces stronger independent evidence.
    async fn apply_semantic_strategy(
        &self,
        source: &Note,
        opts: &RecommendOptions,
        candidates: &mut CandidateMap,
    ) {
        let Some(service) = &self.embeddings else {
            debug!(strategy = "semantic", "No embedding service, skipping");
            return;
        };
        if !service.is_ready() {
            debug!(strategy = "semantic", "Embedding service not ready, skipping");
            return;
        }

        let hits = match service
            .find_similar_notes(
                &source.id,
                &FindSimilarOptions {
                    limit: opts.semantic_limit,
                    threshold: opts.semantic_threshold,
                    exclude_ids: vec![source.id.clone()],
                },
            )
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                // semantic failure degrades to tag+graph-only results
                warn!(strategy = "semantic", error = %e, "Strategy failed, skipping");
                return;
            }
        };

        for hit in hits {
            if hit.note_id == source.id {
                continue;
            }
            let similarity = hit.similarity.clamp(0.0, 1.0);
            let reason = format!("semantic similarity: {:.0}%", similarity * 100.0);

            match candidates.get_mut(&hit.note_id) {
                Some(existing) => {
                    let boosted =
                        (existing.score + similarity * opts.semantic_boost_weight).min(1.0);
                    existing.score = existing.score.max(boosted);
                    if !existing.has_reason_with_prefix("semantic similarity") {
                        existing.add_reason(reason);
                    }
                }
                None => {
                    match RecommendationItem::new(
                        hit.note_id.clone(),
                        &hit.title,
                        &hit.note_path,
                        similarity,
                    ) {
                        Ok(mut item) => {
                            item.add_reason(reason);
                            candidates.insert(item);
                        }
                        Err(e) => warn!(note_id = %hit.note_id, error = %e, "Dropping invalid candidate"),
                    }
                }
            }
        }
    }
}
