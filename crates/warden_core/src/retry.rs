//! Bounded retry of transient store failures.
//!
//! Only [`PolicyError::StoreUnavailable`] is ever retried. Everything else is
//! terminal and surfaces to the caller unchanged.
//!
//! Whether a transient failure may be retried also depends on the operation:
//! a timeout can fire after SQLite already committed, so operations that must
//! not run twice (consuming a token, adding to a counter) are only retried
//! when the store reports the failure happened before anything was applied.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};

/// Configuration for retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u8,
    /// Base backoff time in milliseconds
    pub base_backoff_ms: u64,
    /// Maximum backoff time in milliseconds
    pub max_backoff_ms: u64,
    /// Jitter range in milliseconds (added to backoff)
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 50,
            max_backoff_ms: 1_000,
            jitter_ms: 25,
        }
    }
}

/// How safe an operation is to repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Running twice has the same effect as running once.
    Idempotent,
    /// Must not be applied twice.
    AtMostOnce,
}

/// Decide whether `err` on attempt number `attempt` should be retried.
fn should_retry(
    err: &PolicyError,
    idempotency: Idempotency,
    attempt: u8,
    config: &RetryConfig,
) -> bool {
    if attempt >= config.max_attempts {
        return false;
    }
    match err {
        PolicyError::StoreUnavailable { source, .. } => match idempotency {
            Idempotency::Idempotent => true,
            Idempotency::AtMostOnce => source.is_retry_safe(),
        },
        _ => false,
    }
}

/// Run a store-backed operation, retrying transient failures with backoff.
pub async fn with_store_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &'static str,
    idempotency: Idempotency,
    mut op: F,
) -> PolicyResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PolicyResult<T>>,
{
    let mut attempts = 0u8;

    loop {
        attempts += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if should_retry(&err, idempotency, attempts, config) => {
                let wait_ms = calculate_backoff(attempts, config);
                tracing::warn!(
                    operation,
                    attempt = attempts,
                    wait_ms,
                    error = %err,
                    "Store operation failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
            Err(PolicyError::StoreUnavailable { source, .. }) => {
                return Err(PolicyError::StoreUnavailable {
                    attempts: u32::from(attempts),
                    source,
                });
            }
            Err(err) => return Err(err),
        }
    }
}

/// Calculate exponential backoff with cap.
fn calculate_backoff(attempt: u8, config: &RetryConfig) -> u64 {
    let base = config.base_backoff_ms;
    let exponential = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1) as u32));
    let capped = exponential.min(config.max_backoff_ms);
    let jitter = if config.jitter_ms > 0 {
        rand::rng().random_range(0..config.jitter_ms)
    } else {
        0
    };
    capped.saturating_add(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use warden_db::DbError;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 4,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
            jitter_ms: 0,
        }
    }

    fn unavailable(maybe_applied: bool) -> PolicyError {
        PolicyError::from(DbError::unavailable("busy", maybe_applied))
    }

    #[test]
    fn test_calculate_backoff() {
        let config = RetryConfig {
            base_backoff_ms: 100,
            max_backoff_ms: 1_000,
            jitter_ms: 0, // No jitter for deterministic test
            ..Default::default()
        };

        assert_eq!(calculate_backoff(1, &config), 100);
        assert_eq!(calculate_backoff(2, &config), 200);
        assert_eq!(calculate_backoff(3, &config), 400);
        assert_eq!(calculate_backoff(4, &config), 800);
        // Should cap at max
        assert_eq!(calculate_backoff(10, &config), 1_000);
    }

    #[test]
    fn test_should_retry_classification() {
        let config = fast();
        assert!(should_retry(&unavailable(true), Idempotency::Idempotent, 1, &config));
        assert!(!should_retry(&unavailable(true), Idempotency::AtMostOnce, 1, &config));
        assert!(should_retry(&unavailable(false), Idempotency::AtMostOnce, 1, &config));
        assert!(!should_retry(&PolicyError::TokenExpired, Idempotency::Idempotent, 1, &config));
        // Out of attempts
        assert!(!should_retry(&unavailable(false), Idempotency::Idempotent, 4, &config));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = &AtomicU32::new(0);
        let result = with_store_retry(&fast(), "flaky", Idempotency::Idempotent, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(unavailable(true))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let calls = &AtomicU32::new(0);
        let err = with_store_retry(&fast(), "down", Idempotency::Idempotent, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(unavailable(true))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, PolicyError::StoreUnavailable { attempts: 4, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_at_most_once_stops_on_ambiguous_failure() {
        let calls = &AtomicU32::new(0);
        let err = with_store_retry(&fast(), "consume", Idempotency::AtMostOnce, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(unavailable(true))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, PolicyError::StoreUnavailable { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let err = with_store_retry(&fast(), "consume", Idempotency::Idempotent, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(PolicyError::InvalidToken)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, PolicyError::InvalidToken));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
