//! Mock inference backend for deterministic testing.
//!
//! Implements the real backend traits so services and engines can be
//! exercised without a network. Embeddings are derived from text content,
//! so the same text always produces the same vector, and failures are
//! scripted (queued ahead of time) rather than random, so tests stay
//! reproducible.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use notemesh_core::{
    Completion, Embedding, EmbeddingBackend, EmbeddingBatch, Error, GenerationBackend,
    GenerationOptions, InferenceBackend, ProviderError, ProviderErrorKind, Result,
};

/// One recorded call against the mock.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

#[derive(Debug)]
struct MockState {
    fixed_responses: HashMap<String, String>,
    default_response: String,
    /// Errors served before any successful call, in order.
    scripted_failures: VecDeque<Error>,
    /// Inputs containing any of these substrings always fail (retryable).
    failing_patterns: Vec<String>,
    call_log: Vec<MockCall>,
    configured: bool,
}

/// Mock inference backend with deterministic output.
#[derive(Clone)]
pub struct MockInferenceBackend {
    dimension: usize,
    state: Arc<Mutex<MockState>>,
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            dimension: 384,
            state: Arc::new(Mutex::new(MockState {
                fixed_responses: HashMap::new(),
                default_response: "Mock response".to_string(),
                scripted_failures: VecDeque::new(),
                failing_patterns: Vec::new(),
                call_log: Vec::new(),
                configured: true,
            })),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set a fixed response for generation requests.
    pub fn with_fixed_response(self, response: impl Into<String>) -> Self {
        self.state.lock().unwrap().default_response = response.into();
        self
    }

    /// Add a response mapping for a specific prompt.
    pub fn with_response_mapping(
        self,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .fixed_responses
            .insert(input.into(), output.into());
        self
    }

    /// Report the backend as unconfigured.
    pub fn with_unconfigured(self) -> Self {
        self.state.lock().unwrap().configured = false;
        self
    }

    /// Queue an error to be returned by the next call (embed or generate).
    pub fn push_failure(&self, error: Error) {
        self.state.lock().unwrap().scripted_failures.push_back(error);
    }

    /// Make every call whose input contains `pattern` fail with a
    /// retryable error. Lets tests poison one batch while its neighbors
    /// succeed.
    pub fn with_failing_input(self, pattern: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_patterns
            .push(pattern.into());
        self
    }

    /// Queue `n` retryable service failures.
    pub fn push_transient_failures(&self, n: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..n {
            state.scripted_failures.push_back(
                ProviderError::new(ProviderErrorKind::ServiceUnavailable, "scripted failure")
                    .into(),
            );
        }
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().call_log.clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.state.lock().unwrap().call_log.clear()
    }

    /// Number of embed calls made.
    pub fn embed_call_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.operation == "embed")
            .count()
    }

    /// Number of generation calls made.
    pub fn generate_call_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.operation == "generate")
            .count()
    }

    fn begin_call(&self, operation: &str, input: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call_log.push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
        });
        if let Some(err) = state.scripted_failures.pop_front() {
            return Err(err);
        }
        if state.failing_patterns.iter().any(|p| input.contains(p)) {
            return Err(ProviderError::new(
                ProviderErrorKind::ServiceUnavailable,
                "scripted input failure",
            )
            .into());
        }
        Ok(())
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic embedding generator.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Generate a deterministic embedding from text.
    ///
    /// Uses character-based hashing for reproducibility; the same text
    /// always produces the same unit vector.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension];

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }

        Self::normalize(&mut vec);
        vec
    }

    /// Generate an embedding from a seed (deterministic pseudo-random).
    pub fn generate_with_seed(seed: u64, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension];
        let mut state = seed;

        // Simple LCG for deterministic pseudo-random values
        for item in vec.iter_mut() {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            *item = ((state % 1000) as f32) / 1000.0 - 0.5;
        }

        Self::normalize(&mut vec);
        vec
    }

    fn normalize(vec: &mut [f32]) {
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        self.begin_call("embed", &texts.join("\n"))?;

        let vectors = texts
            .iter()
            .map(|t| Embedding::new(MockEmbeddingGenerator::generate(t, self.dimension)))
            .collect::<Result<Vec<_>>>()?;

        Ok(EmbeddingBatch {
            vectors,
            model: "mock-embed".to_string(),
            total_tokens: Some(texts.iter().map(|t| t.len() as u32 / 4).sum()),
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }

    fn is_configured(&self) -> bool {
        self.state.lock().unwrap().configured
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<Completion> {
        self.generate_with_system("", prompt, opts).await
    }

    async fn generate_with_system(
        &self,
        _system: &str,
        prompt: &str,
        _opts: &GenerationOptions,
    ) -> Result<Completion> {
        self.begin_call("generate", prompt)?;

        let state = self.state.lock().unwrap();
        let text = state
            .fixed_responses
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| state.default_response.clone());

        Ok(Completion {
            text,
            model: "mock-gen".to_string(),
            token_count: Some(prompt.len() as u32 / 4),
        })
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }

    fn is_configured(&self) -> bool {
        self.state.lock().unwrap().configured
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().configured)
    }
}
