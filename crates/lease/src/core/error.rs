//! Error taxonomy of the lifecycle layer.
//!
//! The split follows how each failure is handled, not where it occurs:
//! validation failures are permanent and reported to the caller, store
//! races are recovered internally, device failures are retried per
//! policy, and retry exhaustion is terminal per record but never a
//! crash.

use roslease_device::DeviceError;
use thiserror::Error;

use super::id::LeaseId;
use super::record::LeaseState;

/// Rejected request input. Permanent; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The role string is not a recognized capability level.
    #[error("unknown role {role:?}")]
    UnknownRole {
        /// Offending role string.
        role: String,
    },

    /// Requested duration is below the configured minimum.
    #[error("duration {requested_secs}s is below the minimum {min_secs}s")]
    DurationTooShort {
        /// Requested duration in seconds.
        requested_secs: u64,
        /// Configured minimum in seconds.
        min_secs: u64,
    },

    /// Requested duration exceeds the configured maximum.
    #[error("duration {requested_secs}s exceeds the maximum {max_secs}s")]
    DurationTooLong {
        /// Requested duration in seconds.
        requested_secs: u64,
        /// Configured maximum in seconds.
        max_secs: u64,
    },

    /// The actor identity is empty.
    #[error("actor must not be empty")]
    EmptyActor,
}

/// Credential record store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Inserting would leave two live leases for one device account.
    #[error("a live lease already exists for {username} on {device}")]
    Conflict {
        /// Target device.
        device: String,
        /// Contested account name.
        username: String,
    },

    /// Compare-and-set lost: the record is not in the expected state.
    /// The other writer's transition stands; the loser treats this as
    /// a completed no-op.
    #[error("lease {id} is {actual}, expected {expected}")]
    StaleState {
        /// Record the update targeted.
        id: LeaseId,
        /// State the caller required.
        expected: LeaseState,
        /// State actually found.
        actual: LeaseState,
    },

    /// No record with this id.
    #[error("lease {id} not found")]
    NotFound {
        /// Missing id.
        id: LeaseId,
    },

    /// The backing engine failed. Fatal for the operation: a state
    /// transition that cannot be persisted did not happen.
    #[error("store backend failure: {detail}")]
    Backend {
        /// Driver-reported failure.
        detail: String,
    },
}

/// Audit sink failure. Never propagated to lifecycle callers.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The sink could not persist the entry.
    #[error("audit sink failure: {detail}")]
    Backend {
        /// Sink-reported failure.
        detail: String,
    },
}

/// Failure of a lifecycle operation, as reported to callers.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Bad request input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No lease with the given id.
    #[error("lease {id} not found")]
    NotFound {
        /// Missing id.
        id: LeaseId,
    },

    /// The lease is not in a state this operation accepts.
    #[error("lease {id} is {actual}, operation requires {required}")]
    InvalidState {
        /// Targeted lease.
        id: LeaseId,
        /// Stored state found.
        actual: LeaseState,
        /// State the operation requires.
        required: LeaseState,
    },

    /// A device call failed; inspect
    /// [`failure_mode`](DeviceError::failure_mode) before drawing
    /// conclusions about remote state.
    #[error("device call failed")]
    Device(#[from] DeviceError),

    /// A store operation failed.
    #[error("store operation failed")]
    Store(#[from] StoreError),

    /// All revoke attempts failed; the record is now `Failed` and
    /// waits for operator recovery.
    #[error("gave up on lease {id} after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Lease left in `Failed`.
        id: LeaseId,
        /// Attempts made.
        attempts: u32,
        /// Last device error observed.
        last_error: String,
    },
}

/// Convenience alias for lifecycle results.
pub type ManagerResult<T> = Result<T, ManagerError>;
