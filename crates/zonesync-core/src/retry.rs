//! Retry policy for remote calls
//!
//! Only [`Error::is_retryable`] errors are retried. Delays grow exponentially
//! from `base_delay`, capped at `max_delay`; a `RateLimited` error waits for
//! its `Retry-After` hint instead, or `rate_limit_backoff` when there is none.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            rate_limit_backoff: Duration::from_secs(config.rate_limit_backoff_secs),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Exponential delay after the given zero-based attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before retrying after `err` on the given zero-based attempt
    pub fn retry_delay(&self, err: &Error, attempt: u32) -> Duration {
        match err {
            Error::RateLimited {
                retry_after: Some(hint),
            } => *hint,
            Error::RateLimited { retry_after: None } => self.rate_limit_backoff,
            _ => self.backoff_delay(attempt),
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// attempts run out.
    ///
    /// Exhausted rate limiting surfaces as `RemoteUnavailable`.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.retry_delay(&err, attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:.1}s: {}",
                        label,
                        attempt + 1,
                        self.max_attempts,
                        delay.as_secs_f32(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Error::RateLimited { .. }) => {
                    tracing::error!("{} still rate limited after {} attempts", label, attempt + 1);
                    return Err(Error::unavailable(format!(
                        "{label}: rate limited after {} attempts",
                        attempt + 1
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }
}
