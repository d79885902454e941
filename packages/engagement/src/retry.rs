//! Bounded retry of whole transaction attempts.
//!
//! Each attempt opens its own transaction, runs the full read-check-write
//! sequence, and commits. Attempts run under a deadline; a missed deadline
//! counts as a conflict since the store commits all-or-nothing.

use std::future::Future;

use tracing::warn;

use crate::error::{LedgerError, Result, StoreError};
use crate::types::config::RetryPolicy;

/// Why a single attempt failed.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// Conflict or transient outage - will retry if attempts remain
    Retryable(StoreError),
    /// Semantic outcome or permanent failure - surfaced as-is
    NonRetryable(LedgerError),
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            AttemptError::Retryable(err)
        } else {
            AttemptError::NonRetryable(LedgerError::StoreUnavailable(err))
        }
    }
}

impl From<LedgerError> for AttemptError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::StoreUnavailable(store) => store.into(),
            other => AttemptError::NonRetryable(other),
        }
    }
}

pub(crate) type AttemptResult<T> = std::result::Result<T, AttemptError>;

/// Run `attempt` until it succeeds, fails non-retryably, or the policy is exhausted.
///
/// Exhaustion yields `Contention`, unless the last attempt failed because the
/// store was unreachable, which yields `StoreUnavailable`.
pub(crate) async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AttemptResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_outage = None;

    for n in 1..=max_attempts {
        match tokio::time::timeout(policy.attempt_timeout, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(AttemptError::NonRetryable(err))) => return Err(err),
            Ok(Err(AttemptError::Retryable(StoreError::Conflict { key }))) => {
                warn!(operation, attempt = n, %key, "write conflict");
                last_outage = None;
            }
            Ok(Err(AttemptError::Retryable(err))) => {
                warn!(operation, attempt = n, error = %err, "store unavailable");
                last_outage = Some(err);
            }
            Err(_) => {
                warn!(
                    operation,
                    attempt = n,
                    timeout_ms = policy.attempt_timeout.as_millis() as u64,
                    "attempt timed out"
                );
                last_outage = None;
            }
        }

        if n < max_attempts {
            tokio::time::sleep(policy.backoff_for(n)).await;
        }
    }

    Err(match last_outage {
        Some(err) => LedgerError::StoreUnavailable(err),
        None => LedgerError::Contention {
            attempts: max_attempts,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(attempts)
            .with_backoff(Duration::ZERO, Duration::ZERO)
            .with_attempt_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_retries_conflicts_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&fast_policy(5), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AttemptError::Retryable(StoreError::conflict("content/c1")))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_conflicts_are_contention() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = run_with_retry(&fast_policy(3), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::Retryable(StoreError::conflict("content/c1")))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Contention { attempts: 3 })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_semantic_outcome_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = run_with_retry(&fast_policy(5), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::NonRetryable(LedgerError::NotEngaged {
                content_id: "c1".into(),
                user_id: "bob".into(),
            }))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::NotEngaged { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persistent_outage_is_store_unavailable() {
        let result: Result<()> = run_with_retry(&fast_policy(2), "test", || async {
            Err(AttemptError::Retryable(StoreError::unavailable("connection refused")))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_backend_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = run_with_retry(&fast_policy(5), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::from(StoreError::Backend(
                "relation does not exist".into(),
            )))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::StoreUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timed_out_attempts_count_as_conflicts() {
        let policy = fast_policy(2).with_attempt_timeout(Duration::from_millis(10));
        let result: Result<()> = run_with_retry(&policy, "test", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), AttemptError>(())
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Contention { attempts: 2 })));
    }
}
