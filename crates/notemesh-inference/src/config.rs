//! Provider selection and construction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use notemesh_core::{Error, InferenceBackend, Result};

use crate::mock::MockInferenceBackend;
use crate::ollama::OllamaBackend;
use crate::openai::OpenAIBackend;

/// Which inference provider to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama instance (default)
    #[default]
    Ollama,
    /// OpenAI API
    OpenAI,
    /// Deterministic in-process mock (tests)
    Mock,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAI => write!(f, "openai"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Invalid provider: {}", s)),
        }
    }
}

/// Build the configured inference backend.
///
/// Provider selection: `NOTEMESH_PROVIDER` env var → default Ollama.
/// Fails with [`Error::NotConfigured`] when the selected provider is
/// missing credentials; there is no degraded answer possible without a
/// provider.
pub fn backend_from_env() -> Result<Arc<dyn InferenceBackend>> {
    let kind = std::env::var("NOTEMESH_PROVIDER")
        .ok()
        .map(|v| v.parse::<ProviderKind>())
        .transpose()
        .map_err(Error::Config)?
        .unwrap_or_default();

    build_backend(kind)
}

/// Build a backend for an explicit provider kind.
pub fn build_backend(kind: ProviderKind) -> Result<Arc<dyn InferenceBackend>> {
    info!(provider = %kind, "Building inference backend");
    match kind {
        ProviderKind::Ollama => Ok(Arc::new(OllamaBackend::from_env())),
        ProviderKind::OpenAI => {
            let backend = OpenAIBackend::from_env()?;
            if backend.config().api_key.is_none() {
                return Err(Error::NotConfigured(
                    "OpenAI provider selected but OPENAI_API_KEY is not set".to_string(),
                ));
            }
            Ok(Arc::new(backend))
        }
        ProviderKind::Mock => Ok(Arc::new(MockInferenceBackend::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(ProviderKind::Ollama.to_string(), "ollama");
        assert_eq!(ProviderKind::OpenAI.to_string(), "openai");
        assert_eq!(ProviderKind::Mock.to_string(), "mock");
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("OPENAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert_eq!("mock".parse::<ProviderKind>().unwrap(), ProviderKind::Mock);
        assert!("invalid".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_default() {
        assert_eq!(ProviderKind::default(), ProviderKind::Ollama);
    }

    #[test]
    fn test_build_ollama_backend() {
        let backend = build_backend(ProviderKind::Ollama);
        assert!(backend.is_ok());
    }

    #[test]
    fn test_build_mock_backend() {
        let backend = build_backend(ProviderKind::Mock);
        assert!(backend.is_ok());
    }
}
