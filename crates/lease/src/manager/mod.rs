//! Lifecycle manager and its configuration.

pub mod config;
pub mod credentials;
pub mod retry;

#[allow(clippy::module_inception)]
mod manager;

pub use config::{ConfigError, ManagerConfig};
pub use manager::{
    DeviceInfo, IssueRequest, IssuedLease, LeaseManager, SYSTEM_ACTOR, SweepReport,
};
pub use retry::RetryPolicy;
