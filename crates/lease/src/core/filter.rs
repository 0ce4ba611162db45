//! Listing filter.

use roslease_device::DeviceAddress;
use serde::{Deserialize, Serialize};

use super::record::{LeaseRecord, LeaseState};

/// Criteria for listing leases. Empty filter matches everything.
///
/// `state` is matched against the read-time state the manager derives,
/// so filtering for [`LeaseState::ExpiringSoon`] works even though that
/// state is never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseFilter {
    /// Only leases on this device.
    #[serde(default)]
    pub device: Option<DeviceAddress>,
    /// Only leases in this (derived) state.
    #[serde(default)]
    pub state: Option<LeaseState>,
    /// Only leases issued by this actor.
    #[serde(default)]
    pub issued_by: Option<String>,
}

impl LeaseFilter {
    /// Whether `record` passes the device and actor criteria. State is
    /// checked separately by the manager, against the derived state.
    pub fn matches_identity(&self, record: &LeaseRecord) -> bool {
        if self.device.as_ref().is_some_and(|d| record.device != *d) {
            return false;
        }
        if self
            .issued_by
            .as_ref()
            .is_some_and(|a| record.issued_by != *a)
        {
            return false;
        }
        true
    }
}
