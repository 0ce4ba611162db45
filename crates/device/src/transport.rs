//! How a byte stream to a device is obtained.
//!
//! The client only needs something that reads and writes; plain TCP is
//! what RouterOS speaks on 8728 and is the one transport shipped here.
//! Deployments that front the API port with TLS or a jump host supply
//! their own [`DeviceTransport`] implementation.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::addr::DeviceAddress;
use crate::error::{DeviceError, DeviceResult};

/// A bidirectional byte stream to a device.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Connection for T {}

/// Dials a device and hands back a raw stream.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Open a connection to `addr` within the transport's connect bound.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Unreachable`] when the dial fails or the
    /// connect timeout elapses; nothing has been sent in either case.
    async fn dial(&self, addr: &DeviceAddress) -> DeviceResult<Box<dyn Connection>>;
}

/// Plain TCP transport with a connect timeout.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl DeviceTransport for TcpTransport {
    async fn dial(&self, addr: &DeviceAddress) -> DeviceResult<Box<dyn Connection>> {
        let target = (addr.host().to_string(), addr.port());
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(target))
            .await
            .map_err(|_| DeviceError::Unreachable {
                device: addr.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::TimedOut),
            })?
            .map_err(|e| DeviceError::Unreachable {
                device: addr.to_string(),
                source: e,
            })?;
        // Small request/reply exchanges; Nagle only adds latency here.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(device = %addr, error = %e, "could not set TCP_NODELAY");
        }
        Ok(Box::new(stream))
    }
}
