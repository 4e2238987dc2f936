//! Error types for notemesh.

use thiserror::Error;

use crate::models::NoteId;

/// Result type alias using notemesh's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for notemesh operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Value object construction failed (bad id format, empty field, out-of-range score)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vectors of different dimension were compared
    #[error("Dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Embedding store operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Normalized provider failure (carries retryability)
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    /// Operation attempted with no provider configured
    #[error("No provider configured: {0}")]
    NotConfigured(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is worth retrying.
    ///
    /// Only normalized provider errors carry retryability; everything else
    /// (validation, store, config) fails immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider(p) => p.kind.is_retryable(),
            _ => false,
        }
    }

    /// Server-supplied retry-after hint in milliseconds, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Error::Provider(p) => p.retry_after_ms,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        // Transport-level timeouts are retryable like rate limits; everything
        // else at this layer is an opaque request failure.
        if e.is_timeout() {
            Error::Provider(ProviderError::new(ProviderErrorKind::Timeout, e.to_string()))
        } else {
            Error::Request(e.to_string())
        }
    }
}

// =============================================================================
// PROVIDER ERROR TAXONOMY
// =============================================================================

/// Fixed taxonomy every provider call site normalizes raw transport errors
/// into before the retry engine decides whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Rate limit exceeded (HTTP 429).
    RateLimited,
    /// Request-level timeout.
    Timeout,
    /// Provider returned 5xx or is unreachable.
    ServiceUnavailable,
    /// Invalid or missing credentials (HTTP 401/403).
    Auth,
    /// Malformed request rejected by the provider (HTTP 400/404/422).
    InvalidRequest,
    /// Anything that does not fit the taxonomy.
    Unknown,
}

impl ProviderErrorKind {
    /// Classify from an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            429 => Self::RateLimited,
            400 | 404 | 422 => Self::InvalidRequest,
            408 | 504 => Self::Timeout,
            500..=599 => Self::ServiceUnavailable,
            _ => Self::Unknown,
        }
    }

    /// Check if this error class is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::ServiceUnavailable
        )
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Timeout => write!(f, "timeout"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
            Self::Auth => write!(f, "auth"),
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A provider failure normalized into the fixed taxonomy.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    /// Server-supplied Retry-After hint, when present.
    pub retry_after_ms: Option<u64>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Attach a server-supplied retry-after hint.
    pub fn with_retry_after_ms(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<ProviderError> for Error {
    fn from(e: ProviderError) -> Self {
        Error::Provider(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let err = Error::Validation("title must not be empty".to_string());
        assert_eq!(err.to_string(), "Validation error: title must not be empty");
    }

    #[test]
    fn test_error_display_note_not_found() {
        let id = NoteId::new("202401151030").unwrap();
        let err = Error::NoteNotFound(id);
        assert_eq!(err.to_string(), "Note not found: 202401151030");
    }

    #[test]
    fn test_error_display_dimension_mismatch() {
        let err = Error::DimensionMismatch { left: 768, right: 384 };
        assert_eq!(err.to_string(), "Dimension mismatch: 768 vs 384");
    }

    #[test]
    fn test_error_display_store() {
        let err = Error::Store("flush failed".to_string());
        assert_eq!(err.to_string(), "Store error: flush failed");
    }

    #[test]
    fn test_error_display_not_configured() {
        let err = Error::NotConfigured("no embedding provider".to_string());
        assert_eq!(
            err.to_string(),
            "No provider configured: no embedding provider"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_provider_kind_from_status() {
        assert_eq!(ProviderErrorKind::from_status(401), ProviderErrorKind::Auth);
        assert_eq!(ProviderErrorKind::from_status(403), ProviderErrorKind::Auth);
        assert_eq!(
            ProviderErrorKind::from_status(429),
            ProviderErrorKind::RateLimited
        );
        assert_eq!(
            ProviderErrorKind::from_status(400),
            ProviderErrorKind::InvalidRequest
        );
        assert_eq!(
            ProviderErrorKind::from_status(404),
            ProviderErrorKind::InvalidRequest
        );
        assert_eq!(
            ProviderErrorKind::from_status(408),
            ProviderErrorKind::Timeout
        );
        assert_eq!(
            ProviderErrorKind::from_status(500),
            ProviderErrorKind::ServiceUnavailable
        );
        assert_eq!(
            ProviderErrorKind::from_status(503),
            ProviderErrorKind::ServiceUnavailable
        );
        assert_eq!(
            ProviderErrorKind::from_status(418),
            ProviderErrorKind::Unknown
        );
    }

    #[test]
    fn test_provider_kind_retryability() {
        assert!(ProviderErrorKind::RateLimited.is_retryable());
        assert!(ProviderErrorKind::Timeout.is_retryable());
        assert!(ProviderErrorKind::ServiceUnavailable.is_retryable());
        assert!(!ProviderErrorKind::Auth.is_retryable());
        assert!(!ProviderErrorKind::InvalidRequest.is_retryable());
        assert!(!ProviderErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_error_retryability_delegates_to_provider() {
        let retryable: Error =
            ProviderError::new(ProviderErrorKind::RateLimited, "slow down").into();
        assert!(retryable.is_retryable());

        let fatal: Error = ProviderError::new(ProviderErrorKind::Auth, "bad key").into();
        assert!(!fatal.is_retryable());

        assert!(!Error::Validation("nope".into()).is_retryable());
        assert!(!Error::Store("broken".into()).is_retryable());
    }

    #[test]
    fn test_retry_after_hint_carried() {
        let err: Error = ProviderError::new(ProviderErrorKind::RateLimited, "429")
            .with_retry_after_ms(2000)
            .into();
        assert_eq!(err.retry_after_ms(), Some(2000));

        let err: Error = ProviderError::new(ProviderErrorKind::Timeout, "slow").into();
        assert_eq!(err.retry_after_ms(), None);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new(ProviderErrorKind::RateLimited, "too many requests");
        assert_eq!(err.to_string(), "rate_limited: too many requests");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
