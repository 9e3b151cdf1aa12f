//! Fixed-count retry with linear backoff for backend calls.
//!
//! Used for cart synchronisation, where a transient backend failure should
//! not lose the customer's cart: attempt `n` (1-based) that fails with a
//! retryable error waits `base_delay * n` before the next try.

use std::future::Future;
use std::time::Duration;

use crate::api::ApiError;

/// How many times to try a call and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of tries, including the first. Always at least 1.
    pub attempts: u32,
    /// Delay before the second try; later tries wait a multiple of this.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    /// Create a policy. `attempts` is clamped to at least 1.
    #[must_use]
    pub const fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: if attempts == 0 { 1 } else { attempts },
            base_delay,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The last error is returned.
///
/// # Errors
///
/// Returns the error from the final attempt.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, operation: &str, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "Backend call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < policy.attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Backend call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[test]
    fn test_policy_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
        assert_eq!(RetryPolicy::none().attempts, 1);
    }

    #[test]
    fn test_delay_is_linear() {
        let policy = RetryPolicy::new(4, Duration::from_millis(200));
        assert_eq!(policy.delay_after(1), Duration::from_millis(200));
        assert_eq!(policy.delay_after(2), Duration::from_millis(400));
        assert_eq!(policy.delay_after(3), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = retry(
            RetryPolicy::new(3, Duration::from_millis(100)),
            "test",
            || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(server_error())
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.ok(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = retry(
            RetryPolicy::new(3, Duration::from_millis(100)),
            "test",
            || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(server_error())
                }
            },
        )
        .await;

        assert!(matches!(result, Err(ApiError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_does_not_repeat_client_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = retry(RetryPolicy::default(), "test", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::NotFound("cart".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
