//! Retry with exponential back-off and jitter for the Twitter client.
//!
//! [`retry_with_backoff`] wraps a single upstream call and retries on
//! transient errors (network failures, 429, 5xx). Everything else is
//! returned on the first failure.

use std::future::Future;
use std::time::Duration;

use crate::error::TwitterError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:** timeouts, connection failures, HTTP 429 and 5xx.
///
/// **Not retriable:** other 4xx responses, envelope-level failures,
/// malformed bodies, and configuration errors.
pub(crate) fn is_retriable(err: &TwitterError) -> bool {
    match err {
        TwitterError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e
                    .status()
                    .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
        }
        TwitterError::Api { status, .. } => *status == 429 || (500..600).contains(status),
        TwitterError::Rejected(_)
        | TwitterError::Deserialize { .. }
        | TwitterError::MissingApiKey
        | TwitterError::InvalidBaseUrl { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Back-off is `backoff_base_ms × 2^(attempt-1)` with ±25 % jitter, capped at 60 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, TwitterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TwitterError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "Twitter transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
