//! Bounded retry with exponential backoff.

use crate::error::PagewrightError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// How many times to try and how long to wait in between.
///
/// The wait before retry `n` (1-based) is `base_delay * multiplier^(n-1)`,
/// capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "crate::types::duration_ms")]
    pub base_delay: Duration,
    pub multiplier: f64,
    #[serde(with = "crate::types::duration_ms")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), PagewrightError> {
        if self.max_attempts == 0 {
            return Err(PagewrightError::InvalidInput(
                "retry policy needs at least one attempt".to_string(),
            ));
        }
        if !(self.multiplier > 1.0) {
            return Err(PagewrightError::InvalidInput(format!(
                "backoff multiplier must be greater than 1, got {}",
                self.multiplier
            )));
        }
        if self.base_delay.is_zero() {
            return Err(PagewrightError::InvalidInput(
                "backoff base delay must be greater than zero".to_string(),
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(PagewrightError::InvalidInput(format!(
                "backoff max delay ({:?}) must not be shorter than base delay ({:?})",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let power = retry.saturating_sub(1) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(power);
        let delay = Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()));
        delay.max(self.base_delay.min(self.max_delay))
    }
}

/// A value obtained after one or more attempts.
#[derive(Debug, Clone)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
    /// Delays slept between attempts, in order.
    pub delays: Vec<Duration>,
}

/// The last error after the attempt budget ran out (or a non-retryable error).
#[derive(thiserror::Error, Debug)]
#[error("gave up after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted<E: std::fmt::Display + std::fmt::Debug> {
    pub last_error: E,
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

/// Retry `op` on every error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    op: F,
) -> Result<Retried<T>, RetryExhausted<E>>
where
    E: std::fmt::Display + std::fmt::Debug,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_backoff_if(policy, op, |_| true).await
}

/// Retry `op` while `should_retry` accepts the error.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    should_retry: P,
) -> Result<Retried<T>, RetryExhausted<E>>
where
    E: std::fmt::Display + std::fmt::Debug,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delays = Vec::new();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "succeeded after retry");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                    delays,
                });
            }
            Err(e) => {
                if attempt >= max_attempts || !should_retry(&e) {
                    tracing::warn!(attempt, max_attempts, error = %e, "giving up");
                    return Err(RetryExhausted {
                        last_error: e,
                        attempts: attempt,
                        delays,
                    });
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                delays.push(delay);
                attempt += 1;
            }
        }
    }
}
