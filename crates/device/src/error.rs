//! Device call errors and their indeterminacy classification.

use thiserror::Error;

/// Convenience alias for device call results.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Error raised by a RouterOS device call.
///
/// The variants split along a line that matters to the lifecycle layer:
/// whether the remote account table may already have changed when the
/// error surfaced. See [`DeviceError::failure_mode`].
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device did not answer within the command timeout. The command
    /// was already on the wire, so remote state is unknown.
    #[error("{device}: timed out during {operation}")]
    Timeout {
        /// Device the call targeted.
        device: String,
        /// Operation in flight when the timeout fired.
        operation: &'static str,
    },

    /// No connection could be established. Nothing was sent.
    #[error("{device}: unreachable: {source}")]
    Unreachable {
        /// Device the call targeted.
        device: String,
        /// Underlying connect failure.
        #[source]
        source: std::io::Error,
    },

    /// The device rejected the service-account login.
    #[error("{device}: login rejected")]
    Auth {
        /// Device the call targeted.
        device: String,
    },

    /// The byte stream broke or the device sent something the codec
    /// cannot make sense of, mid-exchange. Remote state is unknown.
    #[error("{device}: protocol failure: {detail}")]
    Protocol {
        /// Device the call targeted.
        device: String,
        /// What went wrong on the wire.
        detail: String,
    },

    /// The device evaluated the command and refused it (`!trap`).
    /// The account table was not changed by this command.
    #[error("{device}: command rejected: {message}")]
    Command {
        /// Device the call targeted.
        device: String,
        /// Trap message reported by the device.
        message: String,
    },
}

/// Whether remote state can be reasoned about after a failed call.
///
/// This replaces the boolean success flag of naive API clients: a
/// timeout is not a failure that left the device untouched, it is an
/// unknown. Callers holding an [`FailureMode::Indeterminate`] outcome
/// must re-verify (idempotent delete retry, or an existence check
/// before retrying a create) rather than assume either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// The command may or may not have been applied remotely.
    Indeterminate,
    /// The remote account table is known to be unchanged by this call.
    Determinate,
}

impl DeviceError {
    /// Classify this error by what it implies about remote state.
    pub fn failure_mode(&self) -> FailureMode {
        match self {
            Self::Timeout { .. } | Self::Protocol { .. } => FailureMode::Indeterminate,
            Self::Unreachable { .. } | Self::Auth { .. } | Self::Command { .. } => {
                FailureMode::Determinate
            }
        }
    }

    /// True when remote state is unknown after this error.
    pub fn is_indeterminate(&self) -> bool {
        self.failure_mode() == FailureMode::Indeterminate
    }
}
