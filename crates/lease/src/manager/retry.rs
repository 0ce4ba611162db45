//! Revoke retry policy.

use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff for device revoke calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, the first call included.
    pub max_attempts: u32,

    /// Backoff before the second attempt.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Growth factor between attempts.
    pub backoff_multiplier: f32,

    /// Ceiling on any single backoff.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based), with ±10%
    /// jitter so sweeps hitting one device don't retry in lockstep.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_backoff.as_millis() as f32;
        let backoff_ms = base_ms * self.backoff_multiplier.powi(attempt as i32);

        let jitter = rand::rng().random_range(0.9..=1.1);
        let jittered_ms = (backoff_ms * jitter) as u64;

        Duration::from_millis(jittered_ms).min(self.max_backoff)
    }
}
