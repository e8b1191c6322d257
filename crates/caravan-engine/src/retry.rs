//! Per-step retry policy.

use std::time::Duration;

use caravan_config::EngineConfig;

/// How the executor reacts to a failed step.
///
/// Retries are counted per step. With `max_retries = n` a step fails at
/// most `n + 1` times before its workflow is failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub auto_retry: bool,
    pub max_retries: u32,
    /// Wait before the first retry.
    pub retry_delay: Duration,
    /// 1.0 keeps the delay fixed.
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            auto_retry: false,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Fail the workflow on the first step failure.
    pub fn no_retry() -> Self {
        Self::default()
    }

    /// Retry each step up to `max_retries` times with a fixed delay.
    pub fn fixed(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            auto_retry: true,
            max_retries,
            retry_delay,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Whether a step that has already been retried `retries` times gets
    /// another attempt.
    pub fn should_retry(&self, retries: u32) -> bool {
        self.auto_retry && retries < self.max_retries
    }

    /// Wait before the retry following `retries` earlier retries.
    pub fn delay_for(&self, retries: u32) -> Duration {
        let exponent = i32::try_from(retries).unwrap_or(i32::MAX);
        let secs = self.retry_delay.as_secs_f64() * self.backoff_multiplier.max(1.0).powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        if secs.is_finite() && secs < cap {
            Duration::from_secs_f64(secs)
        } else {
            self.max_delay
        }
    }
}

impl From<&EngineConfig> for RetryPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            auto_retry: config.auto_retry,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            backoff_multiplier: config.backoff_multiplier,
            max_delay: config.max_retry_delay(),
        }
    }
}
