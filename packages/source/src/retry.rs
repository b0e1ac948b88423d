//! Bounded exponential-backoff retry for fallible async operations.
//!
//! Both remote query paths (count probe and page fetch) go through a
//! [`RetryPolicy`] instead of calling the HTTP client directly, so
//! transient failures get the same backoff treatment everywhere. The
//! policy is an explicit value so callers can share one policy or
//! deliberately diverge — the persistence path, notably, does not use
//! one (see the database package).

use std::future::Future;
use std::time::Duration;

/// Retry schedule for a fallible operation: after the `n`-th failure,
/// wait `min(base * 2^(n-1), cap)` before trying again, up to
/// `max_attempts` total attempts. No jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    /// The production schedule: 4s base, 10s cap, 5 attempts
    /// (delays of 4s, 8s, 10s, 10s between attempts).
    fn default() -> Self {
        Self::new(Duration::from_secs(4), Duration::from_secs(10), 5)
    }
}

impl RetryPolicy {
    /// Creates a policy with the given base delay, delay cap, and total
    /// attempt budget.
    #[must_use]
    pub const fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// The delay to wait after `attempt` consecutive failures (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Runs `op` until it succeeds or the attempt budget is exhausted,
    /// retrying every failure.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Exhausted`] carrying the last failure once
    /// `max_attempts` consecutive attempts have failed.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.run_if(op, |_| true).await
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is exhausted.
    ///
    /// `retryable` classifies failures; an error it rejects is returned
    /// immediately as [`RetryError::Permanent`] with no further attempts.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Permanent`] for a non-retryable failure, or
    /// [`RetryError::Exhausted`] after `max_attempts` retryable failures.
    pub async fn run_if<T, E, F, Fut, P>(&self, mut op: F, retryable: P) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        P: Fn(&E) -> bool,
    {
        let max = self.max_attempts.max(1);

        for attempt in 1..=max {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !retryable(&e) => return Err(RetryError::Permanent(e)),
                Err(e) if attempt == max => {
                    return Err(RetryError::Exhausted {
                        attempts: max,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    log::warn!("attempt {attempt}/{max} failed, retrying in {delay:?}: {e}");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        unreachable!("retry loop exited without returning")
    }
}

/// Terminal outcome of a retried operation.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// Every attempt failed; carries the last failure.
    #[error("giving up after {attempts} attempts: {source}")]
    Exhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The failure from the final attempt.
        source: E,
    },
    /// The operation failed with an error not worth retrying.
    #[error(transparent)]
    Permanent(E),
}
