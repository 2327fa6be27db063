//! Retry utilities for resilient operations
//!
//! A single retry/backoff policy reused by every endpoint-specific call.
//! The policy is parameterized by the attempt budget, the base delay and the
//! backoff shape; the caller supplies the predicate deciding which errors
//! are worth another attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Shape of the delay curve between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `base × retry` (3s, 6s, 9s, ...)
    Linear,
    /// `base × multiplier^(retry - 1)` (1s, 2s, 4s, ...)
    Exponential { multiplier: f64 },
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (caps growth)
    pub max_delay_ms: u64,

    /// Delay curve
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 3000,
            max_delay_ms: 30_000,
            backoff: Backoff::Linear,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with a custom attempt budget
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Create a policy with custom delays
    pub fn with_delays(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            backoff: Backoff::Linear,
        }
    }

    /// Switch to exponential backoff
    #[must_use]
    pub fn exponential(mut self, multiplier: f64) -> Self {
        self.backoff = Backoff::Exponential { multiplier };
        self
    }

    /// Delay applied before the given attempt (attempt 1 is the first try)
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let retry = attempt - 1;
        let delay_ms = match self.backoff {
            Backoff::Linear => self.base_delay_ms.saturating_mul(u64::from(retry)),
            Backoff::Exponential { multiplier } => {
                (self.base_delay_ms as f64 * multiplier.powi(retry as i32 - 1)) as u64
            }
        };
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Successful outcome of a retried operation
#[derive(Debug, Clone)]
pub struct Retried<T> {
    /// Value produced by the successful attempt
    pub value: T,

    /// Number of attempts made (1 = first try succeeded)
    pub attempts: u32,

    /// Delays slept before each retry, in order
    pub delays: Vec<Duration>,
}

/// Execute an operation with retry logic, using a custom retry predicate
///
/// The operation receives the 1-based attempt number. Errors for which
/// `should_retry` returns false are returned immediately; otherwise the last
/// error is returned once the attempt budget is spent.
///
/// # Example
///
/// ```no_run
/// use feedsift::utils::retry::{with_retry_if, RetryPolicy};
///
/// # async fn example() -> Result<(), String> {
/// let policy = RetryPolicy::with_delays(3, 100, 1_000);
/// let outcome = with_retry_if(
///     &policy,
///     |attempt| async move {
///         if attempt < 2 { Err("busy".to_string()) } else { Ok(attempt) }
///     },
///     |e: &String| e == "busy",
/// )
/// .await?;
/// assert_eq!(outcome.attempts, 2);
/// # Ok(())
/// # }
/// ```
pub async fn with_retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<Retried<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delays = Vec::new();
    let mut attempt = 1;

    loop {
        if attempt > 1 {
            let delay = policy.delay_before(attempt);
            debug!(
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying operation after delay"
            );
            tokio::time::sleep(delay).await;
            delays.push(delay);
        }

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                    delays,
                });
            }
            Err(e) => {
                if !should_retry(&e) {
                    debug!(error = %e, "Non-retryable error encountered");
                    return Err(e);
                }
                if attempt >= max_attempts {
                    warn!(
                        attempts = attempt,
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return Err(e);
                }
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Operation failed, will retry"
                );
            }
        }

        attempt += 1;
    }
}

/// Execute an operation retrying every error
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<Retried<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_if(policy, operation, |_| true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let policy = RetryPolicy::with_delays(3, 1, 10);
        let outcome = with_retry(&policy, |_| async { Ok::<_, String>(42) })
            .await
            .unwrap();
        assert_eq!(outcome.value, 42);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.delays.is_empty());
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let policy = RetryPolicy::with_delays(4, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let outcome = with_retry(&policy, move |_| {
            let calls = Arc::clone(&calls_clone);
            async move {
                let count = calls.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    return Err("simulated failure".to_string());
                }
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, 42);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.delays.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let policy = RetryPolicy::with_delays(2, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<Retried<()>, String> = with_retry(&policy, move |_| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("permanent failure".to_string())
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "permanent failure");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_if_predicate_stops_early() {
        let policy = RetryPolicy::with_delays(5, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<Retried<()>, String> = with_retry_if(
            &policy,
            move |_| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("validation error".to_string())
                }
            },
            |e| !e.contains("validation"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_linear_delay() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(3000));
        assert_eq!(policy.delay_before(3), Duration::from_millis(6000));
        assert_eq!(policy.delay_before(4), Duration::from_millis(9000));
    }

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy::with_delays(5, 1000, 60_000).exponential(2.0);

        assert_eq!(policy.delay_before(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_before(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_before(4), Duration::from_millis(4000));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::with_delays(10, 1000, 5000);
        assert_eq!(policy.delay_before(10), Duration::from_millis(5000));
    }
}
