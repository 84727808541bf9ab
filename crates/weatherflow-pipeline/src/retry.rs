//! Run-level retry policy with a fixed backoff.
//!
//! A failed run is retried as a whole, never stage by stage:
//! - Timeouts, refused connections, 5xx/408/429 and a busy database retry
//! - Schema errors, other 4xx, DDL/insert failures and cancellation do not

use std::time::Duration;

use weatherflow_core::RetryConfig;

use crate::error::RunError;

/// Default retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const DEFAULT_DELAY_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Wait between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.delay())
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Upper bound on runs per trigger.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the retry following `attempt`. Fixed, regardless of attempt.
    pub fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }

    /// Decide whether to run again after `attempts` runs, the last failing with `error`.
    pub fn decide(&self, error: &RunError, attempts: u32) -> RetryDecision {
        if !error.is_retryable() {
            tracing::debug!("Not retryable: {}", error);
            return RetryDecision::NoRetry;
        }

        if attempts >= self.max_attempts() {
            tracing::debug!("Retry budget of {} exhausted", self.max_retries);
            return RetryDecision::NoRetry;
        }

        RetryDecision::Retry
    }
}
