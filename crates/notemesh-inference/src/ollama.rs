//! Ollama inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use notemesh_core::defaults;
use notemesh_core::{
    Completion, Embedding, EmbeddingBackend, EmbeddingBatch, Error, GenerationBackend,
    GenerationOptions, InferenceBackend, ProviderError, ProviderErrorKind, Result,
};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::GEN_MODEL;

/// Default embedding dimension for nomic-embed-text.
pub const DEFAULT_DIMENSION: usize = defaults::EMBED_DIMENSION;

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    gen_model: String,
    dimension: usize,
    embed_timeout_secs: u64,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            DEFAULT_GEN_MODEL.to_string(),
            DEFAULT_DIMENSION,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(
        base_url: String,
        embed_model: String,
        gen_model: String,
        dimension: usize,
    ) -> Self {
        let gen_timeout = std::env::var("NOTEMESH_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::GEN_TIMEOUT_SECS);

        let embed_timeout = std::env::var("NOTEMESH_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::EMBED_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout))
            .build()
            .expect("Failed to create HTTP client");

        info!(
            "Initializing Ollama backend: url={}, embed={}, gen={}",
            base_url, embed_model, gen_model
        );

        Self {
            client,
            base_url,
            embed_model,
            gen_model,
            dimension,
            embed_timeout_secs: embed_timeout,
            gen_timeout_secs: gen_timeout,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let embed_model =
            std::env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let gen_model =
            std::env::var("OLLAMA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        let dimension = std::env::var("OLLAMA_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DIMENSION);

        Self::with_config(base_url, embed_model, gen_model, dimension)
    }

    /// Set the generation model to use.
    pub fn set_gen_model(&mut self, model_name: String) {
        info!(
            "Switching generation model from {} to {}",
            self.gen_model, model_name
        );
        self.gen_model = model_name;
    }

    /// Set the embedding model to use.
    pub fn set_embed_model(&mut self, model_name: String) {
        info!(
            "Switching embedding model from {} to {}",
            self.embed_model, model_name
        );
        self.embed_model = model_name;
    }

    /// Normalize a non-success HTTP response into a provider error.
    async fn classify_response(context: &str, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1_000);
        let body = response.text().await.unwrap_or_default();

        let mut err = ProviderError::new(
            ProviderErrorKind::from_status(status),
            format!("{}: Ollama returned {}: {}", context, status, body),
        );
        if let Some(ms) = retry_after_ms {
            err = err.with_retry_after_ms(ms);
        }
        err.into()
    }

    /// Generate via the `/api/chat` endpoint, which separates
    /// thinking/reasoning from the final response for models that have it.
    async fn generate_internal(
        &self,
        system: &str,
        prompt: &str,
        opts: &GenerationOptions,
    ) -> Result<Completion> {
        let start = Instant::now();

        debug!(json_format = opts.json, "Starting generation via chat API");

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let format = opts.json.then(|| serde_json::json!("json"));
        let think = opts.json.then_some(false);
        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
            format,
            think,
            options: ChatModelOptions {
                temperature: opts.temperature,
                num_predict: opts.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify_response("generate", response).await);
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30_000 {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(Completion {
            text: content,
            model: self.gen_model.clone(),
            token_count: result.eval_count,
        })
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Model tuning passed through to Ollama.
#[derive(Serialize)]
struct ChatModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Ollama format enforcement. Set to `"json"` for guaranteed valid JSON output.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    /// Disable thinking/reasoning for models that support it.
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
    options: ChatModelOptions,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed_texts", model = %self.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                vectors: vec![],
                model: self.embed_model.clone(),
                total_tokens: None,
            });
        }

        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.embed_model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(Duration::from_secs(self.embed_timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify_response("embed", response).await);
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                result.embeddings.len(),
                texts.len()
            )));
        }

        let vectors: Vec<Embedding> = result
            .embeddings
            .into_iter()
            .map(Embedding::new)
            .collect::<Result<_>>()?;
        let elapsed = start.elapsed().as_millis() as u64;

        debug!(
            result_count = vectors.len(),
            duration_ms = elapsed,
            "Embedding complete"
        );
        if elapsed > 5_000 {
            warn!(
                duration_ms = elapsed,
                input_count = texts.len(),
                slow = true,
                "Slow embedding operation"
            );
        }
        Ok(EmbeddingBatch {
            vectors,
            model: self.embed_model.clone(),
            total_tokens: result.prompt_eval_count,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }

    fn is_configured(&self) -> bool {
        // Local endpoint, no credentials needed.
        !self.base_url.is_empty()
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, prompt, opts), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<Completion> {
        self.generate_internal("", prompt, opts).await
    }

    #[instrument(skip(self, system, prompt, opts), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
        opts: &GenerationOptions,
    ) -> Result<Completion> {
        self.generate_internal(system, prompt, opts).await
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_config() {
        let backend = OllamaBackend::new();
        assert_eq!(backend.base_url, DEFAULT_OLLAMA_URL);
        assert_eq!(EmbeddingBackend::model_name(&backend), DEFAULT_EMBED_MODEL);
        assert_eq!(GenerationBackend::model_name(&backend), DEFAULT_GEN_MODEL);
        assert_eq!(backend.dimension(), DEFAULT_DIMENSION);
    }

    #[test]
    fn test_custom_config() {
        let backend = OllamaBackend::with_config(
            "http://localhost:9999".to_string(),
            "my-embed-model".to_string(),
            "my-gen-model".to_string(),
            384,
        );
        assert_eq!(EmbeddingBackend::model_name(&backend), "my-embed-model");
        assert_eq!(GenerationBackend::model_name(&backend), "my-gen-model");
        assert_eq!(backend.dimension(), 384);
    }

    #[test]
    fn test_set_models() {
        let mut backend = OllamaBackend::new();
        backend.set_gen_model("qwen3:8b".to_string());
        backend.set_embed_model("mxbai-embed-large".to_string());
        assert_eq!(GenerationBackend::model_name(&backend), "qwen3:8b");
        assert_eq!(EmbeddingBackend::model_name(&backend), "mxbai-embed-large");
    }

    #[test]
    fn test_is_configured() {
        let backend = OllamaBackend::new();
        assert!(EmbeddingBackend::is_configured(&backend));
        assert!(GenerationBackend::is_configured(&backend));
    }

    #[test]
    fn test_chat_request_serialization_skips_absent_options() {
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
            format: None,
            think: None,
            options: ChatModelOptions {
                temperature: None,
                num_predict: None,
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("format"));
        assert!(!json.contains("think"));
        assert!(!json.contains("temperature"));
        assert!(!json.contains("num_predict"));
    }

    #[test]
    fn test_embedding_response_parses_token_count() {
        let json = r#"{"embeddings": [[0.1, 0.2]], "prompt_eval_count": 7}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.embeddings.len(), 1);
        assert_eq!(resp.prompt_eval_count, Some(7));

        let json = r#"{"embeddings": []}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert!(resp.prompt_eval_count.is_none());
    }

    // Live tests against a running Ollama instance. Run with:
    //   cargo test -p notemesh-inference -- --ignored
    mod live {
        use super::*;

        fn live_backend() -> OllamaBackend {
            dotenvy::dotenv().ok();
            OllamaBackend::from_env()
        }

        #[tokio::test]
        #[ignore]
        async fn test_health_check() {
            let backend = live_backend();
            let healthy = backend.health_check().await.unwrap();
            assert!(healthy);
        }

        #[tokio::test]
        #[ignore]
        async fn test_embed_single_text() {
            let backend = live_backend();
            let texts = vec!["the quick brown fox".to_string()];
            let batch = backend.embed_texts(&texts).await.expect("embedding failed");
            assert_eq!(batch.vectors.len(), 1);
            assert_eq!(batch.vectors[0].dimension(), backend.dimension());
        }

        #[tokio::test]
        #[ignore]
        async fn test_embed_multiple_texts_preserves_order() {
            let backend = live_backend();
            let texts = vec![
                "first text".to_string(),
                "second text".to_string(),
                "third text".to_string(),
            ];
            let batch = backend.embed_texts(&texts).await.expect("embedding failed");
            assert_eq!(batch.vectors.len(), 3);

            // Same text embeds identically; order must match input.
            let again = backend
                .embed_texts(&texts[..1].to_vec())
                .await
                .expect("embedding failed");
            assert_eq!(batch.vectors[0], again.vectors[0]);
        }

        #[tokio::test]
        #[ignore]
        async fn test_generate_simple() {
            let backend = live_backend();
            let completion = backend
                .generate("Reply with the word ok.", &GenerationOptions::default())
                .await
                .expect("generation failed");
            assert!(!completion.text.is_empty());
        }
    }
}
