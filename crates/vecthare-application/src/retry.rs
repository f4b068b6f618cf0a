//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;

use vecthare_domain::error::{Error, Result};

/// Retry policy: bounded attempts, exponential delay growth, capped delay
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Ceiling on any single delay
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub factor: f64,
}

impl RetryPolicy {
    /// Policy used for network calls: 3 attempts, 1 s base, 10 s cap, 2x
    pub fn network() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
        }
    }

    /// Policy used for startup discovery: 3 attempts, 2 s base, 10 s cap, 2x
    pub fn discovery() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
        }
    }

    /// Delay before attempt `n` (0-based; attempt 0 has no delay)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32 - 1);
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `op` until it succeeds, the error is not retryable, or attempts are
/// exhausted. Only [`Error::is_retryable`] errors are retried.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err: Option<Error> = None;
    for attempt in 0..policy.attempts {
        let delay = policy.delay_for(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < policy.attempts => {
                tracing::debug!(
                    "{} attempt {}/{} failed, retrying: {}",
                    label,
                    attempt + 1,
                    policy.attempts,
                    e
                );
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| Error::internal(format!("{label}: retry loop exhausted"))))
}
