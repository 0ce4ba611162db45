//! RouterOS management-API client for roslease.
//!
//! Implements the binary word/sentence protocol the RouterOS API service
//! speaks on port 8728, plus the small command surface roslease needs:
//! account creation and removal, reachability probes, identity lookup,
//! and account counting.
//!
//! The crate is split along the seams the lifecycle layer cares about:
//!
//! - [`proto`] - wire codec (length-prefixed words, sentence framing)
//! - [`transport`] - how a byte stream to a device is obtained
//! - [`client`] - login and command execution on top of a transport
//! - [`DeviceCommander`] - the trait the lifecycle manager programs against
//!
//! Every failure carries a [`FailureMode`]: a call that died after the
//! command may have hit the device is *indeterminate*, and callers must
//! re-verify remote state instead of assuming the operation failed.
#![forbid(unsafe_code)]

pub mod addr;
pub mod client;
pub mod config;
pub mod error;
pub mod proto;
pub mod transport;

mod commander;

pub use addr::{AddressError, DeviceAddress};
pub use client::RouterOsClient;
pub use commander::{AccountCounts, Confirmation, DeviceCommander};
pub use config::{DeviceConfig, TEMP_ACCOUNT_MARKER};
pub use error::{DeviceError, DeviceResult, FailureMode};
pub use transport::{DeviceTransport, TcpTransport};
