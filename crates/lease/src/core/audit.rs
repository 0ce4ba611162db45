//! Append-only audit entries for lifecycle transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::id::LeaseId;

/// What happened to a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A lease was issued and activated.
    Issue,
    /// A lease was revoked manually.
    Revoke,
    /// A lease expired and was revoked by the sweep.
    ExpireAuto,
    /// A lease moved to `Failed`.
    Fail,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Issue => "issue",
            Self::Revoke => "revoke",
            Self::ExpireAuto => "expire_auto",
            Self::Fail => "fail",
        };
        f.write_str(s)
    }
}

/// One immutable audit entry. `record_id` is a lookup reference, not
/// ownership: entries outlive any view of the lease they describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry id.
    pub id: Uuid,
    /// Lease this entry describes.
    pub record_id: LeaseId,
    /// Identity that caused the transition (`system` for sweeps).
    pub actor: String,
    /// Transition kind.
    pub action: AuditAction,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
    /// Free-form context (device, role, error text).
    pub detail: String,
}

impl AuditEntry {
    /// Build an entry with a fresh id.
    pub fn new(
        record_id: LeaseId,
        actor: impl Into<String>,
        action: AuditAction,
        timestamp: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id,
            actor: actor.into(),
            action,
            timestamp,
            detail: detail.into(),
        }
    }
}
