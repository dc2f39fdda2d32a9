//! Bounded exponential backoff shared by discovery, fetch and weather lookups.

use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 總嘗試次數（含第一次）
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Listing pages: patient, a failure here is fatal for the run
    pub fn discovery() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }

    /// Per-request retry inside a competition fetch
    pub fn fetch() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            multiplier: 2.0,
        }
    }

    /// Open-Meteo throttles hard: 4s, 8s, 16s between attempts
    pub fn weather() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 4_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
        }
    }

    /// Skater lookups: 1s, 2s between attempts
    pub fn seasonal_best() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 8_000,
            multiplier: 2.0,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms as u64).min(Duration::from_millis(self.max_delay_ms))
    }
}

/// Outcome of a retried operation, with how many attempts were spent.
#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached. Only [`EtlError::is_retryable`] errors are retried.
pub async fn retry_transient<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Retried<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!("{} succeeded after {} attempts", operation_name, attempt);
                }
                return Retried {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = config.delay_for_attempt(attempt - 1);
                let reason = if matches!(e, EtlError::RateLimitedError { .. }) {
                    "rate limited"
                } else {
                    "transient failure"
                };
                tracing::warn!(
                    "⏳ {} {} (attempt {}/{}): {}. Retrying in {:?}",
                    operation_name,
                    reason,
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Retried {
                    result: Err(e),
                    attempts: attempt,
                }
            }
        }
    }
}
