//! Retry with exponential backoff.
//!
//! Attempts are numbered from 1. After a failed attempt `n` the next one
//! starts after `min(base * 2^(n-1), cap)`; with the default policy that is
//! 1s, 2s, 4s, 8s, then 10s from there on.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{CacheError, Result};

// == Retry Policy ==
/// Backoff parameters for [`RetryPolicy::retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    // == Retry ==
    /// Runs `producer` until it succeeds or `1 + max_retries` attempts fail.
    ///
    /// Exhausting the budget returns [`CacheError::MaxRetriesExceeded`]
    /// wrapping the last failure.
    pub async fn retry<T, F, Fut>(&self, max_retries: u32, mut producer: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match producer().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt <= max_retries => {
                    let delay = self.delay_for(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempts = attempt, error = %err, "retry budget exhausted");
                    return Err(CacheError::MaxRetriesExceeded {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
            }
        }
    }
}

/// [`RetryPolicy::retry`] with the default backoff.
pub async fn retry<T, F, Fut>(producer: F, max_retries: u32) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryPolicy::default().retry(max_retries, producer).await
}
