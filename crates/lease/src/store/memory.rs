//! In-memory lease store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use roslease_device::DeviceAddress;
use std::collections::HashMap;

use super::{LeaseStore, StateFields};
use crate::core::{LeaseFilter, LeaseId, LeaseRecord, LeaseState, StoreError};

/// `HashMap` behind a `parking_lot::RwLock`.
///
/// The write lock is what makes insert's uniqueness check and the
/// compare-and-set in `update_state` atomic: per-record transitions
/// are totally ordered by lock acquisition.
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    records: RwLock<HashMap<LeaseId, LeaseRecord>>,
}

impl MemoryLeaseStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, live or terminal.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn is_live(state: LeaseState) -> bool {
    matches!(state, LeaseState::Pending | LeaseState::Active)
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn insert(&self, record: LeaseRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let clash = records.values().any(|existing| {
            is_live(existing.state)
                && existing.device == record.device
                && existing.username == record.username
        });
        if clash {
            return Err(StoreError::Conflict {
                device: record.device.to_string(),
                username: record.username,
            });
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn update_state(
        &self,
        id: LeaseId,
        expected: LeaseState,
        new: LeaseState,
        fields: StateFields,
    ) -> Result<LeaseRecord, StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        if record.state != expected {
            return Err(StoreError::StaleState {
                id,
                expected,
                actual: record.state,
            });
        }
        record.state = new;
        if let Some(at) = fields.revoked_at {
            record.revoked_at = Some(at);
        }
        if let Some(by) = fields.revoked_by {
            record.revoked_by = Some(by);
        }
        if let Some(confirmed) = fields.remote_confirmed {
            record.remote_confirmed = confirmed;
        }
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: LeaseId) -> Result<Option<LeaseRecord>, StoreError> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn find_live_by_device_user(
        &self,
        device: &DeviceAddress,
        username: &str,
    ) -> Result<Option<LeaseRecord>, StoreError> {
        let records = self.records.read();
        Ok(records
            .values()
            .find(|r| is_live(r.state) && r.device == *device && r.username == username)
            .cloned())
    }

    async fn find_due_for_expiry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaseRecord>, StoreError> {
        let records = self.records.read();
        let mut due: Vec<LeaseRecord> = records
            .values()
            .filter(|r| r.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.expires_at);
        Ok(due)
    }

    async fn list(&self, filter: &LeaseFilter) -> Result<Vec<LeaseRecord>, StoreError> {
        let records = self.records.read();
        let mut matched: Vec<LeaseRecord> = records
            .values()
            .filter(|r| filter.matches_identity(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }
}
