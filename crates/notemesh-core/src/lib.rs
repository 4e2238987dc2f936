//! # notemesh-core
//!
//! Core types, traits, and abstractions for the notemesh library.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other notemesh crates depend on.

pub mod cancel;
pub mod defaults;
pub mod embedding;
pub mod error;
pub mod logging;
pub mod models;
pub mod tags;
pub mod testing;
pub mod traits;

// Re-export commonly used types at crate root
pub use cancel::CancelFlag;
pub use embedding::{cosine_similarity, euclidean_distance, Embedding};
pub use error::{Error, ProviderError, ProviderErrorKind, Result};
pub use models::*;
pub use tags::{matched_tags, normalize_tag, normalize_tags};
pub use traits::*;
