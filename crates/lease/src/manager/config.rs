//! Lifecycle manager configuration.

use serde::Deserialize;
use std::time::Duration;

use super::retry::RetryPolicy;

/// Tunables of the lifecycle manager and the expiry sweep.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Shortest lease a caller may request.
    #[serde(with = "humantime_serde")]
    pub min_duration: Duration,

    /// Longest lease a caller may request.
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,

    /// Generated password length.
    pub password_length: usize,

    /// Cap on the actor-derived part of generated usernames.
    pub username_prefix_len: usize,

    /// Retry policy for device revoke calls.
    pub retry: RetryPolicy,

    /// How often the expiry sweep runs.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Active leases within this window of their deadline read as
    /// `ExpiringSoon`.
    #[serde(with = "humantime_serde")]
    pub expiring_soon_window: Duration,

    /// Concurrent revokes allowed against one device during a sweep.
    pub per_device_concurrency: usize,

    /// Concurrent revokes allowed in total during a sweep.
    pub sweep_fan_out: usize,

    /// Delivery attempts per audit entry before dropping it.
    pub audit_attempts: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_secs(5 * 60),
            max_duration: Duration::from_secs(24 * 60 * 60),
            password_length: 12,
            username_prefix_len: 12,
            retry: RetryPolicy::default(),
            sweep_interval: Duration::from_secs(120),
            expiring_soon_window: Duration::from_secs(15 * 60),
            per_device_concurrency: 2,
            sweep_fan_out: 8,
            audit_attempts: 3,
        }
    }
}

/// Configuration rejected at construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `min_duration` is not strictly below `max_duration`.
    #[error("min_duration {min:?} must be below max_duration {max:?}")]
    DurationBounds {
        /// Configured minimum.
        min: Duration,
        /// Configured maximum.
        max: Duration,
    },

    /// A field that must be positive is zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending field name.
        field: &'static str,
    },

    /// Generated passwords would be too weak.
    #[error("password_length {0} is below the minimum of 8")]
    PasswordTooShort(usize),
}

impl ManagerConfig {
    /// Check internal consistency. Call once after deserializing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_duration >= self.max_duration {
            return Err(ConfigError::DurationBounds {
                min: self.min_duration,
                max: self.max_duration,
            });
        }
        if self.password_length < 8 {
            return Err(ConfigError::PasswordTooShort(self.password_length));
        }
        for (field, value) in [
            ("min_duration", self.min_duration.as_secs() as usize),
            ("sweep_interval", self.sweep_interval.as_secs() as usize),
            ("per_device_concurrency", self.per_device_concurrency),
            ("sweep_fan_out", self.sweep_fan_out),
            ("username_prefix_len", self.username_prefix_len),
            ("retry.max_attempts", self.retry.max_attempts as usize),
            ("audit_attempts", self.audit_attempts as usize),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }
}
