//! Temporary credential lifecycle manager for RouterOS devices.
//!
//! roslease issues time-bound device accounts, tracks their expiry,
//! and revokes them reliably across partial failures and concurrent
//! requests. The pieces:
//!
//! - [`core`] - lease records, states, roles, audit entries, errors
//! - [`store`] - the record store contract and an in-memory impl; all
//!   state transitions go through its compare-and-set
//! - [`manager`] - [`LeaseManager`], the sole writer of transitions:
//!   issue, revoke, sweep, extend, operator recovery
//! - [`sweep`] - the periodic expiry sweep task
//! - [`audit`] - best-effort append-only audit trail
//! - [`clock`] - injected time source
//!
//! Device I/O lives in the `roslease-device` crate behind the
//! [`DeviceCommander`] trait; the essentials are re-exported here.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use roslease::{
//!     AccessRole, AuditRecorder, IssueRequest, LeaseManager, ManagerConfig,
//!     MemoryAuditSink, MemoryLeaseStore, RouterOsClient, SystemClock,
//! };
//!
//! let config = ManagerConfig::default();
//! let manager = Arc::new(LeaseManager::new(
//!     Arc::new(MemoryLeaseStore::new()),
//!     Arc::new(RouterOsClient::new(device_config)),
//!     AuditRecorder::new(Arc::new(MemoryAuditSink::new()), config.audit_attempts),
//!     Arc::new(SystemClock),
//!     config,
//! ));
//!
//! let issued = manager
//!     .issue(
//!         IssueRequest {
//!             device: "10.0.0.1".parse()?,
//!             role: AccessRole::ReadOnly,
//!             duration: Duration::from_secs(3600),
//!             purpose: "switch maintenance".into(),
//!         },
//!         "alice",
//!     )
//!     .await?;
//! ```
#![forbid(unsafe_code)]

pub mod audit;
pub mod clock;
pub mod core;
pub mod manager;
pub mod store;
pub mod sweep;

pub use audit::{AuditRecorder, AuditSink, MemoryAuditSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crate::core::{
    AccessRole, AuditAction, AuditEntry, AuditError, LeaseFilter, LeaseId, LeaseRecord,
    LeaseState, ManagerError, ManagerResult, StoreError, ValidationError,
};
pub use manager::{
    ConfigError, DeviceInfo, IssueRequest, IssuedLease, LeaseManager, ManagerConfig, RetryPolicy,
    SYSTEM_ACTOR, SweepReport,
};
pub use store::{LeaseStore, MemoryLeaseStore, StateFields};
pub use sweep::ExpirySweeper;

pub use roslease_device::{
    AccountCounts, Confirmation, DeviceAddress, DeviceCommander, DeviceConfig, DeviceError,
    DeviceResult, FailureMode, RouterOsClient,
};
