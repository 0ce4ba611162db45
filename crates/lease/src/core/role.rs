//! Capability levels and their RouterOS group mapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ValidationError;

/// Capability level of an issued account.
///
/// Roles are the caller-facing vocabulary; on the device they collapse
/// onto RouterOS's built-in groups via [`AccessRole::device_group`].
/// `Admin` and `Full` both map to `full` — the distinction exists for
/// audit attribution, not device policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRole {
    /// Administrative access.
    Admin,
    /// Full read/write access.
    Full,
    /// Write access without user management.
    Write,
    /// Read-only access.
    ReadOnly,
}

impl AccessRole {
    /// The RouterOS group this role maps to.
    pub fn device_group(self) -> &'static str {
        match self {
            Self::Admin | Self::Full => "full",
            Self::Write => "write",
            Self::ReadOnly => "read",
        }
    }
}

impl fmt::Display for AccessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Admin => "admin",
            Self::Full => "full",
            Self::Write => "write",
            Self::ReadOnly => "read_only",
        };
        f.write_str(s)
    }
}

impl FromStr for AccessRole {
    type Err = ValidationError;

    /// Accepts both the short names and the legacy portal spellings
    /// (`full_access`, `write_access`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "full" | "full_access" => Ok(Self::Full),
            "write" | "write_access" => Ok(Self::Write),
            "read_only" | "read-only" | "read" => Ok(Self::ReadOnly),
            _ => Err(ValidationError::UnknownRole {
                role: s.to_string(),
            }),
        }
    }
}
