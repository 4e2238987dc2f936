//! # notemesh-recommend
//!
//! The recommendation scoring engine that fuses tag, graph, and semantic
//! signals into one ranked list, plus the connection reason service that
//! explains a recommendation with an LLM-classified relationship label.

pub mod engine;
pub mod reason;

pub use engine::{RecommendOptions, RecommendationEngine};
pub use reason::{ConnectionReasonService, ReasonConfig};
