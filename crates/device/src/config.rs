//! Device client configuration.

use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::addr::DEFAULT_API_PORT;

/// Marker stamped into the comment of every account this service
/// creates. The lifecycle layer prefixes its comments with it and
/// `count_accounts` recognizes temporary accounts by it.
pub const TEMP_ACCOUNT_MARKER: &str = "roslease temporary account";

/// Configuration for talking to RouterOS devices.
///
/// Loaded once at startup by the embedding service; the service account
/// named here is what roslease itself logs in with, distinct from the
/// temporary accounts it issues.
#[derive(Clone, Deserialize)]
pub struct DeviceConfig {
    /// Service-account username on the managed devices.
    pub service_user: String,

    /// Service-account password. Never logged or re-serialized.
    pub service_password: SecretString,

    /// Port assumed when a device address carries none.
    #[serde(default = "default_port")]
    pub default_port: u16,

    /// Hard bound on establishing a TCP connection.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Hard bound on a single command exchange (login or command).
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Comment marker stamped on every account this service creates;
    /// also how temporary accounts are recognized when counting.
    #[serde(default = "default_comment_marker")]
    pub comment_marker: String,
}

fn default_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_comment_marker() -> String {
    TEMP_ACCOUNT_MARKER.to_string()
}

impl DeviceConfig {
    /// Build a config with defaults for everything but the service
    /// account.
    pub fn new(service_user: impl Into<String>, service_password: SecretString) -> Self {
        Self {
            service_user: service_user.into(),
            service_password,
            default_port: default_port(),
            connect_timeout: default_connect_timeout(),
            command_timeout: default_command_timeout(),
            comment_marker: default_comment_marker(),
        }
    }
}

// The password stays out of Debug output on purpose.
impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("service_user", &self.service_user)
            .field("default_port", &self.default_port)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .field("comment_marker", &self.comment_marker)
            .finish_non_exhaustive()
    }
}
