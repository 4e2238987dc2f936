//! Generic retry executor with exponential backoff and jitter.
//!
//! Every network call in notemesh goes through [`with_retry`]. Failures
//! are classified through the [`ProviderErrorKind`] taxonomy before a
//! retry decision is made: rate limits, timeouts, and 5xx-class errors
//! are retried; auth failures and malformed requests re-raise
//! immediately.
//!
//! Delay policy is dual: a server-supplied retry-after hint wins over the
//! exponential formula, so explicit server guidance is never ignored and
//! blind exponential retries don't herd.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use notemesh_core::defaults;
use notemesh_core::{Error, ProviderErrorKind, Result};

/// Options for the retry executor.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling on any computed delay in milliseconds.
    pub max_delay_ms: u64,
    /// Fraction of the backoff delay added as random jitter (0.0-1.0).
    pub jitter_factor: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: defaults::RETRY_MAX_RETRIES,
            base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_delay_ms: defaults::RETRY_MAX_DELAY_MS,
            jitter_factor: defaults::RETRY_JITTER_FACTOR,
        }
    }
}

impl RetryOptions {
    /// Create options from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `NOTEMESH_RETRY_MAX` | `3` | Max retries after the first attempt |
    /// | `NOTEMESH_RETRY_BASE_DELAY_MS` | `1000` | Backoff base delay |
    /// | `NOTEMESH_RETRY_MAX_DELAY_MS` | `30000` | Delay ceiling |
    pub fn from_env() -> Self {
        let mut opts = Self::default();

        if let Ok(v) = std::env::var("NOTEMESH_RETRY_MAX") {
            if let Ok(n) = v.parse::<u32>() {
                opts.max_retries = n;
            }
        }
        if let Ok(v) = std::env::var("NOTEMESH_RETRY_BASE_DELAY_MS") {
            if let Ok(n) = v.parse::<u64>() {
                opts.base_delay_ms = n;
            }
        }
        if let Ok(v) = std::env::var("NOTEMESH_RETRY_MAX_DELAY_MS") {
            if let Ok(n) = v.parse::<u64>() {
                opts.max_delay_ms = n;
            }
        }
        opts
    }

    /// Set the maximum retry count.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the backoff base delay.
    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Set the delay ceiling.
    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Set the jitter fraction.
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }
}

/// Compute the delay before retry attempt `attempt` (0-based).
///
/// With a server hint: `min(hint + buffer, max_delay)`. Without:
/// `base * 2^attempt` plus `jitter_factor * jitter_roll` of that value,
/// capped at `max_delay`. `jitter_roll` must be in `[0, 1]`; callers
/// outside tests pass a random roll.
pub fn compute_delay(
    opts: &RetryOptions,
    attempt: u32,
    retry_after_ms: Option<u64>,
    jitter_roll: f64,
) -> Duration {
    let ms = match retry_after_ms {
        Some(hint) => (hint + defaults::RETRY_AFTER_BUFFER_MS).min(opts.max_delay_ms),
        None => {
            let base = opts
                .base_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt));
            let jitter = (base as f64 * opts.jitter_factor * jitter_roll) as u64;
            base.saturating_add(jitter).min(opts.max_delay_ms)
        }
    };
    Duration::from_millis(ms)
}

/// Run an async operation, retrying retryable failures with backoff.
///
/// `label` names the operation in log output. The final error is re-raised
/// unchanged once the error is non-retryable or attempts are exhausted.
pub async fn with_retry<T, F, Fut>(label: &str, opts: &RetryOptions, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(op = label, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.is_retryable() || attempt >= opts.max_retries {
                    if err.is_retryable() {
                        warn!(
                            op = label,
                            attempt,
                            error = %err,
                            "Retries exhausted"
                        );
                    }
                    return Err(err);
                }

                let roll = rand::thread_rng().gen::<f64>();
                let delay = compute_delay(opts, attempt, err.retry_after_ms(), roll);
                warn!(
                    op = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retryable failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Convenience constructor for retryable provider errors in tests and
/// backends: a rate limit with an optional server hint.
pub fn rate_limited(message: impl Into<String>, retry_after_ms: Option<u64>) -> Error {
    let mut err = notemesh_core::ProviderError::new(ProviderErrorKind::RateLimited, message);
    if let Some(ms) = retry_after_ms {
        err = err.with_retry_after_ms(ms);
    }
    err.into()
}
