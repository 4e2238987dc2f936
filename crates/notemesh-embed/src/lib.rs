//! # notemesh-embed
//!
//! The embedding service for notemesh: content preparation and hashing,
//! staleness detection, and batched vector generation with rate-limit-aware
//! retry, progress reporting, and cooperative cancellation.

pub mod content;
pub mod service;

pub use content::{content_hash, prepare_for_embedding, prepare_with_budget};
pub use service::{EmbedConfig, EmbeddingService};
