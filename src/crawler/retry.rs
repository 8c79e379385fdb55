//! Retry and pacing policy for the transport

use crate::config::HttpOptions;
use rand::Rng;
use std::time::Duration;

/// Lower bound of the inter-request jitter factor
const JITTER_MIN: f64 = 0.8;

/// Upper bound of the inter-request jitter factor
const JITTER_MAX: f64 = 1.2;

/// Retry and pacing configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each further retry
    pub initial_backoff: Duration,
    /// Base delay between consecutive fetches
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_options(options: &HttpOptions) -> Self {
        Self {
            max_retries: options.max_retries,
            initial_backoff: options.backoff(),
            delay: options.delay(),
        }
    }

    /// Backoff before the given retry (1-based): initial, 2x, 4x, ...
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }

    /// Whether another retry is allowed after `retries_done` retries
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// The inter-request delay scaled by a uniform factor in [0.8, 1.2]
    pub fn jittered_delay(&self) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = rand::rng().random_range(JITTER_MIN..=JITTER_MAX);
        Duration::try_from_secs_f64(self.delay.as_secs_f64() * factor).unwrap_or(self.delay)
    }
}
