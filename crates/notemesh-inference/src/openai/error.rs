//! OpenAI-specific error normalization.

use notemesh_core::{Error, ProviderError, ProviderErrorKind};

/// Normalize an OpenAI error response into the shared provider taxonomy.
///
/// Classification considers both HTTP status and the API's `error.type`
/// string; a Retry-After header value (in milliseconds) is attached when
/// the server supplied one.
pub fn classify_openai_error(
    status: u16,
    error_type: &str,
    message: &str,
    retry_after_ms: Option<u64>,
) -> Error {
    let kind = match (status, error_type) {
        (_, "rate_limit_exceeded") => ProviderErrorKind::RateLimited,
        (_, "insufficient_quota") => ProviderErrorKind::Auth,
        (400, t) if t.contains("context_length") => ProviderErrorKind::InvalidRequest,
        _ => ProviderErrorKind::from_status(status),
    };

    let mut err = ProviderError::new(kind, format!("OpenAI returned {}: {}", status, message));
    if let Some(ms) = retry_after_ms {
        err = err.with_retry_after_ms(ms);
    }
    err.into()
}
