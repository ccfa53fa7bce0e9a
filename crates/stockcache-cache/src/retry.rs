//! Retry with exponential backoff for record source calls.
//!
//! [`retry_with_backoff`] wraps a fallible source query and retries it while
//! the error is transient ([`SourceError::is_retriable`]). Anything else
//! (not found, contract violations, other 4xx) ends the loop at once.

use std::future::Future;
use std::time::Duration;

use stockcache_source::SourceError;

/// The final error of a retried operation and how many attempts were made.
#[derive(Debug)]
pub(crate) struct RetryExhausted {
    pub error: SourceError,
    pub attempts: u32,
}

/// Delay slept after failed attempt `attempt` (1-based): `base × 2^attempt`.
pub(crate) fn backoff_delay(backoff_base: Duration, attempt: u32) -> Duration {
    backoff_base.saturating_mul(1u32 << attempt.min(20))
}

/// Runs `operation` up to `max_attempts` times in total.
///
/// # Backoff schedule (example with `backoff_base = 1s`, `max_attempts = 3`)
///
/// | Attempt | Sleep after failure |
/// |---------|---------------------|
/// | 1       | 1 s × 2¹ = 2 s      |
/// | 2       | 1 s × 2² = 4 s      |
/// | 3       | none (give up)      |
///
/// Sleeps use `tokio::time::sleep`, so a dropped caller cancels the wait.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    backoff_base: Duration,
    mut operation: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retriable() || attempt >= max_attempts {
                    return Err(RetryExhausted {
                        error,
                        attempts: attempt,
                    });
                }

                let delay = backoff_delay(backoff_base, attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "record source transient error, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
