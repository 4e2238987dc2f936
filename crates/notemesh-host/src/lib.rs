//! # notemesh-host
//!
//! The in-process command surface a host application (editor plugin or
//! similar) calls into. There is no wire protocol and no CLI; commands
//! are plain async methods returning typed outcomes for the host to
//! render. Every command runs inside a tracing span carrying a generated
//! request id, so one command's provider calls and store writes correlate
//! in the logs.

use std::sync::Arc;

use tracing::{info_span, Instrument};
use uuid::Uuid;

use notemesh_core::{
    CancelFlag, ConnectionReason, EmbedReport, EmbedStatus, Error, NoteId, NoteIndex,
    RecommendationResponse, RefreshableEmbeddingStore, Result, StoreStats,
};
use notemesh_embed::EmbeddingService;
use notemesh_recommend::{ConnectionReasonService, RecommendOptions, RecommendationEngine};

/// Initialize tracing for a host process.
///
/// Filter via `RUST_LOG` (e.g. `RUST_LOG=notemesh_embed=debug`); defaults
/// to `info`. Safe to call once at host startup; returns quietly if a
/// subscriber is already installed.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// The wired-together services behind the host commands.
pub struct HostServices {
    notes: Arc<dyn NoteIndex>,
    engine: Arc<RecommendationEngine>,
    embeddings: Arc<EmbeddingService>,
    reasons: Option<Arc<ConnectionReasonService>>,
    /// Present when the embedding store is backed by an external index
    /// that can be re-read on demand.
    refreshable: Option<Arc<dyn RefreshableEmbeddingStore>>,
}

impl HostServices {
    pub fn new(
        notes: Arc<dyn NoteIndex>,
        engine: Arc<RecommendationEngine>,
        embeddings: Arc<EmbeddingService>,
    ) -> Self {
        Self {
            notes,
            engine,
            embeddings,
            reasons: None,
            refreshable: None,
        }
    }

    /// Attach the connection reason service.
    pub fn with_reasons(mut self, reasons: Arc<ConnectionReasonService>) -> Self {
        self.reasons = Some(reasons);
        self
    }

    /// Attach a refreshable handle to the embedding store.
    pub fn with_refreshable_store(mut self, store: Arc<dyn RefreshableEmbeddingStore>) -> Self {
        self.refreshable = Some(store);
        self
    }

    fn span(&self, command: &str) -> tracing::Span {
        // field names follow the schema in notemesh_core::logging
        info_span!(
            "host_command",
            subsystem = "host",
            op = command,
            request_id = %Uuid::new_v4(),
        )
    }

    /// Compute recommendations for a note.
    pub async fn show_recommendations(
        &self,
        id: &NoteId,
        opts: &RecommendOptions,
    ) -> Result<RecommendationResponse> {
        self.engine
            .recommend(id, opts)
            .instrument(self.span("show-recommendations"))
            .await
    }

    /// Recompute recommendations, forcing a store refresh first when the
    /// store is backed by an external index.
    pub async fn refresh_recommendations(
        &self,
        id: &NoteId,
        opts: &RecommendOptions,
    ) -> Result<RecommendationResponse> {
        let span = self.span("refresh-recommendations");
        async {
            if let Some(store) = &self.refreshable {
                store.refresh(true).await?;
            }
            self.engine.recommend(id, opts).await
        }
        .instrument(span)
        .await
    }

    /// Embed every stale or missing note in the vault.
    pub async fn generate_embeddings_for_all_notes(
        &self,
        progress: impl FnMut(usize, usize),
        cancel: &CancelFlag,
    ) -> Result<EmbedReport> {
        self.embeddings
            .embed_all(progress, cancel)
            .instrument(self.span("generate-embeddings-for-all-notes"))
            .await
    }

    /// Embed one note (the host's "current note").
    pub async fn generate_embedding_for_current_note(&self, id: &NoteId) -> Result<EmbedStatus> {
        let span = self.span("generate-embedding-for-current-note");
        async {
            let note = self
                .notes
                .find_by_id(id)
                .await?
                .ok_or_else(|| Error::NoteNotFound(id.clone()))?;
            self.embeddings.embed_note(&note).await
        }
        .instrument(span)
        .await
    }

    /// Remove every stored embedding, returning how many were removed.
    pub async fn clear_all_embeddings(&self) -> Result<usize> {
        let span = self.span("clear-all-embeddings");
        async {
            let store = self.embeddings.store();
            let removed = store.clear().await?;
            store.flush().await?;
            Ok(removed)
        }
        .instrument(span)
        .await
    }

    /// Store statistics for display.
    pub async fn show_embedding_statistics(&self) -> Result<StoreStats> {
        self.embeddings
            .store()
            .stats()
            .instrument(self.span("show-embedding-statistics"))
            .await
    }

    /// Classify the relationship between two notes (the "why is this
    /// recommended" explanation).
    pub async fn explain_connection(
        &self,
        source_id: &NoteId,
        target_id: &NoteId,
    ) -> Result<ConnectionReason> {
        let span = self.span("explain-connection");
        async {
            let reasons = self.reasons.as_ref().ok_or_else(|| {
                Error::NotConfigured("connection reason service is not attached".to_string())
            })?;
            let source = self
                .notes
                .find_by_id(source_id)
                .await?
                .ok_or_else(|| Error::NoteNotFound(source_id.clone()))?;
            let target = self
                .notes
                .find_by_id(target_id)
                .await?
                .ok_or_else(|| Error::NoteNotFound(target_id.clone()))?;
            reasons.classify(&source, &target).await
        }
        .instrument(span)
        .await
    }
}
