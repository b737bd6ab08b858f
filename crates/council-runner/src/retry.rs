//! Bounded exponential backoff for platform calls.
//!
//! Backoff for attempt `n` (0-based) is `min(base * 2^n, max)`. Only
//! [`PlatformError::Transient`] is retried; anything else returns at once.

use crate::platform::PlatformError;
use council::config::PlatformConfig;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PlatformConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &PlatformConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay before retry number `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Run `op` until it succeeds, fails non-transiently, or retries run out.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let backoff = policy.backoff(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    status = ?e.status(),
                    error = %e,
                    "Transient platform error, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(
                        operation,
                        attempts = attempt + 1,
                        error = %e,
                        "Platform retries exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}
