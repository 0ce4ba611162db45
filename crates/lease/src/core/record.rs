//! Lease records and their state machine.

use chrono::{DateTime, Utc};
use roslease_device::DeviceAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::id::LeaseId;
use super::role::AccessRole;

/// State of a lease record.
///
/// Stored transitions are `Pending -> Active -> Revoked`, with `Failed`
/// reachable from both non-terminal states. `ExpiringSoon` is a derived
/// read-time view of an `Active` record near its deadline; it is never
/// written to the store and never a CAS target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    /// Record inserted, remote account not yet confirmed.
    Pending,
    /// Remote account confirmed to exist.
    Active,
    /// Active and within the expiry warning window (derived).
    ExpiringSoon,
    /// Remote account confirmed removed.
    Revoked,
    /// Retries exhausted; remote state unknown, operator action needed.
    Failed,
}

impl LeaseState {
    /// Whether this state accepts no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::ExpiringSoon => "expiring_soon",
            Self::Revoked => "revoked",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One issued temporary credential.
///
/// The store is the single authority for these; the manager mutates
/// state only through the store's compare-and-set. `expires_at` never
/// changes after insert — extending a lease creates a new record whose
/// [`extends`](Self::extends) points back here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Unique id, immutable.
    pub id: LeaseId,
    /// Target device.
    pub device: DeviceAddress,
    /// Account name on the device.
    pub username: String,
    /// Capability level of the account.
    pub role: AccessRole,
    /// Caller-supplied reason for the access.
    pub purpose: String,
    /// Who requested the lease.
    pub issued_by: String,
    /// Device identity name captured at issue time, when readable.
    pub device_identity: Option<String>,
    /// Issue timestamp.
    pub created_at: DateTime<Utc>,
    /// Deadline; strictly after `created_at`, immutable.
    pub expires_at: DateTime<Utc>,
    /// Current stored state.
    pub state: LeaseState,
    /// When the account was revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Who revoked it (`system` for expiry sweeps).
    pub revoked_by: Option<String>,
    /// Whether the device acknowledged the last mutation.
    pub remote_confirmed: bool,
    /// Lease this one extends, if any.
    pub extends: Option<LeaseId>,
}

impl LeaseRecord {
    /// Whether this lease is overdue at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == LeaseState::Active && self.expires_at <= now
    }

    /// Read-time state: `Active` inside the warning window reads as
    /// `ExpiringSoon`, everything else as stored.
    pub fn derived_state(&self, now: DateTime<Utc>, warning_window: Duration) -> LeaseState {
        if self.state == LeaseState::Active {
            let window = chrono::Duration::from_std(warning_window)
                .unwrap_or_else(|_| chrono::Duration::zero());
            if self.expires_at - now <= window {
                return LeaseState::ExpiringSoon;
            }
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record_expiring_at(expires_at: DateTime<Utc>) -> LeaseRecord {
        LeaseRecord {
            id: LeaseId::new(),
            device: "10.0.0.1".parse().unwrap(),
            username: "tmp-test".to_string(),
            role: AccessRole::ReadOnly,
            purpose: "maintenance".to_string(),
            issued_by: "alice".to_string(),
            device_identity: None,
            created_at: expires_at - chrono::Duration::hours(1),
            expires_at,
            state: LeaseState::Active,
            revoked_at: None,
            revoked_by: None,
            remote_confirmed: true,
            extends: None,
        }
    }

    #[test]
    fn due_only_when_active_and_past_deadline() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut record = record_expiring_at(now - chrono::Duration::minutes(1));
        assert!(record.is_due(now));

        record.state = LeaseState::Revoked;
        assert!(!record.is_due(now));

        let future = record_expiring_at(now + chrono::Duration::minutes(1));
        assert!(!future.is_due(now));
    }

    #[test]
    fn active_near_deadline_reads_as_expiring_soon() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let window = Duration::from_secs(15 * 60);

        let near = record_expiring_at(now + chrono::Duration::minutes(10));
        assert_eq!(near.derived_state(now, window), LeaseState::ExpiringSoon);

        let far = record_expiring_at(now + chrono::Duration::hours(2));
        assert_eq!(far.derived_state(now, window), LeaseState::Active);

        let mut failed = record_expiring_at(now + chrono::Duration::minutes(10));
        failed.state = LeaseState::Failed;
        assert_eq!(failed.derived_state(now, window), LeaseState::Failed);
    }
}
