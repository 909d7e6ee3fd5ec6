//! Retry with exponential back-off and jitter for upstream sources.
//!
//! Only [`SourceError::RateLimited`] (HTTP 429) is retried. Every other
//! failure, including network errors and 5xx responses, is returned to the
//! caller on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors that are worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &SourceError) -> bool {
    matches!(err, SourceError::RateLimited { .. })
}

/// Delay before retry number `attempt` (1-based), before jitter is applied.
///
/// `base_ms * 2^(attempt - 1)`, capped at 60 s.
pub(crate) fn backoff_delay(backoff_base_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let computed = backoff_base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(computed.min(MAX_DELAY_MS))
}

/// Stretches `delay` to the upstream's `Retry-After` hint when that is
/// longer, still capped at 60 s.
pub(crate) fn honour_retry_after(delay: Duration, err: &SourceError) -> Duration {
    let hinted = match err {
        SourceError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } => Duration::from_secs(*secs),
        _ => Duration::ZERO,
    };
    delay.max(hinted).min(Duration::from_millis(MAX_DELAY_MS))
}

/// Runs `operation` with up to `max_retries` additional attempts on 429s.
///
/// Back-off schedule with `backoff_base_ms = 5_000`:
///
/// | Retry | Sleep before it                 |
/// |-------|---------------------------------|
/// | 1     | 5 000 ms × 2⁰ ± 25 % jitter     |
/// | 2     | 5 000 ms × 2¹ ± 25 % jitter     |
/// | 3     | 5 000 ms × 2² ± 25 % jitter     |
///
/// A `Retry-After` hint longer than the computed delay replaces it.
/// With `max_retries = 3` the operation runs at most 4 times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let capped = backoff_delay(backoff_base_ms, attempt);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let jittered_ms =
                    (capped.as_millis() as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                let delay = honour_retry_after(Duration::from_millis(jittered_ms), &err);
                #[allow(clippy::cast_possible_truncation)]
                let delay_ms = delay.as_millis() as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "upstream rate limited, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
