//! Retry delays.

use fanout_core::config::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Computes the wait before each retry from a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether another attempt is allowed after `attempts` failed ones.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts <= self.policy.max_retries
    }

    /// Delay before retry number `retry` (1-based). With jitter the delay is
    /// drawn uniformly from the upper half of the capped exponential delay.
    pub fn delay(&self, retry: u32) -> Duration {
        let delay = self.policy.backoff(retry);
        if !self.policy.jitter {
            return delay;
        }
        let millis = delay.as_millis() as u64;
        let half = millis / 2;
        if half == 0 {
            return delay;
        }
        Duration::from_millis(half + rand::thread_rng().gen_range(0..=millis - half))
    }
}
