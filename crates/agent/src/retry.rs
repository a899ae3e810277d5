//! Retry with exponential backoff and jitter.

use opsassist_config::ExecutorConfig;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often, and how patiently, a failing operation is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter added to every backoff.
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_jitter,
        }
    }

    /// Retry without sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay(), config.max_jitter())
    }

    /// Deterministic part of the wait after failed attempt `attempt` (0-based):
    /// `base_delay * 2^attempt`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        self.base_delay.saturating_mul(1u32 << shift)
    }

    /// Full wait after failed attempt `attempt`, with fresh jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff(attempt).saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// `op` receives the 0-based attempt index. Between attempts the current task
/// sleeps for [`RetryPolicy::backoff`]; other tasks keep running. The error
/// of the last attempt is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= max_attempts => return Err(e),
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    op = label,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, backing off"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
