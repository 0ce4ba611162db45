//! Credential record store contract.
//!
//! The store is the single source of truth for lease state. All
//! mutation goes through [`LeaseStore::update_state`], a compare-and-set
//! on the current state: last-writer-wins is not acceptable here, since
//! a sweep and a manual revoke may race on the same record.

mod memory;

pub use memory::MemoryLeaseStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roslease_device::DeviceAddress;

use crate::core::{LeaseFilter, LeaseId, LeaseRecord, LeaseState, StoreError};

/// Field updates applied together with a state transition.
///
/// Only `Some` fields are written; everything else is left as stored.
#[derive(Debug, Clone, Default)]
pub struct StateFields {
    /// Set `revoked_at`.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Set `revoked_by`.
    pub revoked_by: Option<String>,
    /// Set `remote_confirmed`.
    pub remote_confirmed: Option<bool>,
}

impl StateFields {
    /// Fields for a confirmed revocation.
    pub fn revoked(at: DateTime<Utc>, by: impl Into<String>) -> Self {
        Self {
            revoked_at: Some(at),
            revoked_by: Some(by.into()),
            remote_confirmed: Some(true),
        }
    }

    /// Fields for a confirmed activation.
    pub fn confirmed() -> Self {
        Self {
            remote_confirmed: Some(true),
            ..Self::default()
        }
    }
}

/// Durable map of lease records.
///
/// Implementations must make [`update_state`](Self::update_state)
/// atomic per record: no two transitions on the same id may both
/// commit. [`insert`](Self::insert) enforces the liveness invariant
/// that at most one `Pending` or `Active` record exists per
/// `(device, username)`.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] when a `Pending` or `Active` record
    /// already exists for this record's `(device, username)`.
    async fn insert(&self, record: LeaseRecord) -> Result<(), StoreError>;

    /// Transition `id` from `expected` to `new`, applying `fields`,
    /// and return the updated record.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleState`] when the stored state is not
    /// `expected` (the caller lost the race and must treat the result
    /// as handled by the winner); [`StoreError::NotFound`] when the id
    /// is unknown.
    async fn update_state(
        &self,
        id: LeaseId,
        expected: LeaseState,
        new: LeaseState,
        fields: StateFields,
    ) -> Result<LeaseRecord, StoreError>;

    /// The record with this id, if any.
    async fn find_by_id(&self, id: LeaseId) -> Result<Option<LeaseRecord>, StoreError>;

    /// The live (`Pending` or `Active`) record for this device account,
    /// if any.
    async fn find_live_by_device_user(
        &self,
        device: &DeviceAddress,
        username: &str,
    ) -> Result<Option<LeaseRecord>, StoreError>;

    /// All `Active` records with `expires_at <= now`, earliest deadline
    /// first.
    async fn find_due_for_expiry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaseRecord>, StoreError>;

    /// Records passing the filter's device and actor criteria, newest
    /// first. State filtering happens in the manager, over derived
    /// states.
    async fn list(&self, filter: &LeaseFilter) -> Result<Vec<LeaseRecord>, StoreError>;
}
