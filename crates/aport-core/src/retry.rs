//! Opt-in retry for verification calls.
//!
//! The client never retries on its own. Callers that want retries wrap a call
//! in [`with_retry`]. Only `NetworkFailure` and `ServiceError` are retried;
//! a denial is a successful result and is never retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use aport_contracts::error::{AportError, AportResult};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    DoNotRetry,
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Decide whether attempt number `attempt` (1-based) should be followed
    /// by another one.
    #[must_use]
    pub fn decide(&self, error: &AportError, attempt: usize) -> RetryDecision {
        if attempt >= self.max_attempts || !error.is_retryable() {
            return RetryDecision::DoNotRetry;
        }

        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let exp = 2_u64.saturating_pow(u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX));
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let delay_ms = base_ms.saturating_mul(exp).min(max_ms);

        let jitter_max = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = if jitter_max > 0 {
            rand::thread_rng().gen_range(0..=jitter_max)
        } else {
            0
        };

        RetryDecision::RetryAfter(Duration::from_millis(delay_ms.saturating_add(jitter_ms)))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. The last error is returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> AportResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AportResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => match policy.decide(&error, attempt) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        kind = %error.kind(),
                        "retrying verification call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::DoNotRetry => {
                    debug!(attempt, kind = %error.kind(), "giving up");
                    return Err(error);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            max_jitter: Duration::ZERO,
        }
    }

    fn network() -> AportError {
        AportError::NetworkFailure {
            reason: "connection reset".to_string(),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            max_jitter: Duration::ZERO,
        };

        assert_eq!(policy.decide(&network(), 1), RetryDecision::RetryAfter(Duration::from_millis(100)));
        assert_eq!(policy.decide(&network(), 2), RetryDecision::RetryAfter(Duration::from_millis(200)));
        assert_eq!(policy.decide(&network(), 3), RetryDecision::RetryAfter(Duration::from_millis(350)));
        assert_eq!(policy.decide(&network(), 10), RetryDecision::DoNotRetry);
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            match policy.decide(&network(), 1) {
                RetryDecision::RetryAfter(d) => {
                    assert!(d >= Duration::from_millis(200));
                    assert!(d <= Duration::from_millis(300));
                }
                RetryDecision::DoNotRetry => panic!("network failure should be retried"),
            }
        }
    }

    #[test]
    fn client_errors_are_not_retried() {
        let policy = fast();
        let auth = AportError::AuthError {
            status: 403,
            message: "Agent not found".to_string(),
        };
        assert_eq!(policy.decide(&auth, 1), RetryDecision::DoNotRetry);
        assert_eq!(policy.decide(&AportError::Cancelled, 1), RetryDecision::DoNotRetry);
        assert_eq!(RetryPolicy::none().decide(&network(), 1), RetryDecision::DoNotRetry);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(&fast(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AportError::ServiceError {
                        status: 503,
                        message: "busy".to_string(),
                    })
                } else {
                    Ok("allowed")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "allowed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: AportResult<()> = with_retry(&fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(network()) }
        })
        .await;

        assert!(matches!(result, Err(AportError::NetworkFailure { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn validation_fails_on_first_attempt() {
        let calls = AtomicUsize::new(0);
        let result: AportResult<()> = with_retry(&fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AportError::Validation {
                    reason: "policy must be a non-empty string".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(AportError::Validation { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
