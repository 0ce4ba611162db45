//! The command surface the lifecycle manager programs against.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::addr::DeviceAddress;
use crate::error::DeviceResult;

/// Acknowledgement that a remote mutation was applied.
///
/// Existence of a `Confirmation` is the only evidence the lifecycle
/// layer accepts that the remote account table changed; errors never
/// imply anything either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Device that acknowledged the operation.
    pub device: DeviceAddress,
    /// Account the operation targeted.
    pub username: String,
}

/// Account counts reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountCounts {
    /// Enabled accounts on the device, the service account included.
    pub total: usize,
    /// Accounts carrying this service's comment marker.
    pub temporary: usize,
}

/// Executes account commands on RouterOS devices.
///
/// All methods carry hard timeouts internally; none blocks
/// indefinitely. Errors must be interpreted through
/// [`DeviceError::failure_mode`](crate::DeviceError::failure_mode)
/// before any retry decision.
#[async_trait]
pub trait DeviceCommander: Send + Sync {
    /// Create `username` on `device` in the given RouterOS group.
    ///
    /// `comment` is stamped on the account so temporary accounts stay
    /// identifiable on the device itself.
    async fn create_account(
        &self,
        device: &DeviceAddress,
        username: &str,
        group: &str,
        password: &SecretString,
        comment: &str,
    ) -> DeviceResult<Confirmation>;

    /// Remove `username` from `device`.
    ///
    /// Idempotent: deleting an account that is already gone succeeds,
    /// so indeterminate outcomes can be retried blindly.
    async fn delete_account(
        &self,
        device: &DeviceAddress,
        username: &str,
    ) -> DeviceResult<Confirmation>;

    /// Whether `username` currently exists on `device`. Used to
    /// re-verify after an indeterminate create outcome.
    async fn account_exists(&self, device: &DeviceAddress, username: &str) -> DeviceResult<bool>;

    /// Whether the device accepts connections on its API port.
    async fn check_reachable(&self, device: &DeviceAddress) -> DeviceResult<bool>;

    /// The device's configured identity name, when readable.
    async fn fetch_identity(&self, device: &DeviceAddress) -> DeviceResult<Option<String>>;

    /// Count enabled accounts, splitting out the ones this service
    /// created (by comment marker).
    async fn count_accounts(&self, device: &DeviceAddress) -> DeviceResult<AccountCounts>;
}
