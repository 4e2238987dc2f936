//! # notemesh-inference
//!
//! Inference provider backends and network-call plumbing for notemesh.
//!
//! Provides the Ollama and OpenAI backends behind the core backend traits,
//! a deterministic mock for tests, and the retry/backoff engine with its
//! two batch-processing strategies that every provider call goes through.

pub mod batch;
pub mod config;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod retry;

pub use batch::{
    process_in_groups, process_individually, BatchOptions, FailureAction, GroupBatchReport,
    GroupFailure, ItemBatchReport, ItemFailure,
};
pub use config::{backend_from_env, build_backend, ProviderKind};
pub use mock::{MockEmbeddingGenerator, MockInferenceBackend};
pub use ollama::OllamaBackend;
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use retry::{compute_delay, with_retry, RetryOptions};
