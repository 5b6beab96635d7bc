use crate::error::Result;
use backoff::backoff::{Backoff, Constant};
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded fixed-wait retry policy.
///
/// `max_attempts` counts every attempt including the first one; the default
/// of 3 is a deliberately conservative bound. The wait between attempts is
/// constant (Redmine deployments tend to come back after maintenance
/// windows, so growing the interval buys nothing) and defaults to 60
/// seconds.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            wait,
        }
    }

    /// Fixed wait, attempt bound unchanged.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    fn backoff(&self) -> Constant {
        Constant::new(self.wait)
    }
}

pub async fn retry_with_wait<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = policy.backoff();
    let mut attempts = 0;

    loop {
        attempts += 1;
        debug!(attempt = attempts, "Executing request");

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(attempts, "Request succeeded after retries");
                }
                return Ok(result);
            }
            Err(err) if err.is_retryable() && attempts < policy.max_attempts => {
                // Constant always yields Some, so the wait is unconditional.
                let wait = backoff.next_backoff().unwrap_or(policy.wait);
                warn!(
                    error = %err,
                    attempt = attempts,
                    wait_ms = wait.as_millis(),
                    "Request failed, retrying"
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => {
                if attempts >= policy.max_attempts && err.is_retryable() {
                    warn!(attempts, "Max attempts exceeded");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transient() -> ApiError {
        ApiError::ServerError {
            status: 502,
            message: "bad gateway".into(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicUsize::new(0);

        let result = retry_with_wait(&policy, || async {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(transient()),
                _ => Ok(42u32),
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_after_exhaustion() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicUsize::new(0);

        let result: Result<()> = retry_with_wait(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient())
        })
        .await;

        assert!(matches!(result, Err(ApiError::ServerError { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicUsize::new(0);

        let result: Result<()> = retry_with_wait(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::NotFound {
                resource: "/issues/1.json".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(ApiError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attempt_bound_never_drops_below_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 1);
    }
}
