//! Validated device address (`host` or `host:port`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Port the plain RouterOS API service listens on.
pub const DEFAULT_API_PORT: u16 = 8728;

/// Maximum accepted host length.
const MAX_HOST_LENGTH: usize = 253;

/// Address validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The address string was empty.
    #[error("device address is empty")]
    Empty,
    /// The host part contains characters outside `[A-Za-z0-9.-]` or is
    /// too long.
    #[error("invalid device host {host:?}: {reason}")]
    InvalidHost {
        /// Offending host part.
        host: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// The port part did not parse as a non-zero u16.
    #[error("invalid device port {port:?}")]
    InvalidPort {
        /// Offending port part.
        port: String,
    },
}

/// Network address of a managed RouterOS device.
///
/// Parsed from `"host"` (API port 8728 assumed) or `"host:port"`. The
/// host is restricted to hostname/IPv4 characters; anything that could
/// smuggle command syntax into the wire protocol is rejected up front.
///
/// # Examples
///
/// ```
/// use roslease_device::DeviceAddress;
///
/// let a: DeviceAddress = "10.0.0.1".parse().unwrap();
/// assert_eq!(a.port(), 8728);
///
/// let b: DeviceAddress = "router.example.net:8729".parse().unwrap();
/// assert_eq!(b.host(), "router.example.net");
/// assert_eq!(b.port(), 8729);
///
/// assert!("".parse::<DeviceAddress>().is_err());
/// assert!("host with spaces".parse::<DeviceAddress>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress {
    host: String,
    port: u16,
}

impl DeviceAddress {
    /// Parse an address, using `default_port` when none is given.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] when the host or port part is invalid.
    pub fn parse(s: &str, default_port: u16) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port: u16 = port.parse().map_err(|_| AddressError::InvalidPort {
                    port: port.to_string(),
                })?;
                if port == 0 {
                    return Err(AddressError::InvalidPort {
                        port: "0".to_string(),
                    });
                }
                (host, port)
            }
            None => (s, default_port),
        };

        if host.is_empty() {
            return Err(AddressError::Empty);
        }
        if host.len() > MAX_HOST_LENGTH {
            return Err(AddressError::InvalidHost {
                host: host.to_string(),
                reason: "exceeds maximum host length",
            });
        }
        if !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(AddressError::InvalidHost {
                host: host.to_string(),
                reason: "only alphanumeric, dots, and hyphens allowed",
            });
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Host part of the address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// API port of the address.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_API_PORT)
    }
}

impl From<DeviceAddress> for String {
    fn from(addr: DeviceAddress) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
