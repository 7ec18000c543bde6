//! Modbus TCP link to the field device.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ModbusConfig;

/// Error type for fieldbus operations.
#[derive(Debug, thiserror::Error)]
pub enum FieldbusError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Modbus exception: {0}")]
    Exception(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of holding registers, as consumed by the sync loop.
pub trait RegisterReader: Send {
    /// Read `count` holding registers starting at `start`.
    fn read_holding_registers(
        &mut self,
        start: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, FieldbusError>> + Send;

    /// Release the underlying connection. Must be idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// A single Modbus TCP session.
///
/// Holds at most one live connection. Reconnecting replaces the connection
/// handle rather than reusing it.
pub struct FieldbusLink {
    host: String,
    port: u16,
    unit_id: u8,
    timeout: Duration,
    ctx: Option<Context>,
}

impl FieldbusLink {
    pub fn new(config: &ModbusConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            unit_id: config.unit_id,
            timeout: config.timeout(),
            ctx: None,
        }
    }

    /// `host:port` of the remote device.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    /// Try to open the TCP session.
    ///
    /// Name resolution and the TCP handshake share one timeout. Returns
    /// `false` on refusal, timeout or resolution failure; the reason is
    /// logged. Any previous connection is closed first.
    pub async fn connect(&mut self) -> bool {
        self.close().await;

        let attempt = open(self.host.clone(), self.port, Slave(self.unit_id));
        let opened = tokio::time::timeout(self.timeout, attempt)
            .await
            .unwrap_or_else(|_| Err(FieldbusError::Connection("Connection timeout".to_string())));

        match opened {
            Ok(ctx) => {
                self.ctx = Some(ctx);
                info!(address = %self.address(), unit_id = self.unit_id, "Modbus connected");
                true
            }
            Err(e) => {
                warn!(address = %self.address(), error = %e, "Modbus connection failed");
                false
            }
        }
    }

    fn context(&mut self) -> Result<&mut Context, FieldbusError> {
        self.ctx.as_mut().ok_or(FieldbusError::NotConnected)
    }

    /// Read holding registers (function code 3).
    ///
    /// A short but otherwise valid response is returned as-is.
    pub async fn read_holding_registers(
        &mut self,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, FieldbusError> {
        let timeout = self.timeout;
        let ctx = self.context()?;

        let registers = tokio::time::timeout(timeout, ctx.read_holding_registers(start, count))
            .await
            .map_err(|_| FieldbusError::Timeout(timeout))?
            .map_err(|e| FieldbusError::Transport(e.to_string()))?
            .map_err(|e| FieldbusError::Exception(format!("{:?}", e)))?;

        debug!(start, count, received = registers.len(), "Read holding registers");
        Ok(registers)
    }

    /// Write multiple holding registers (function code 16).
    pub async fn write_registers(&mut self, start: u16, values: &[u16]) -> Result<(), FieldbusError> {
        let timeout = self.timeout;
        let ctx = self.context()?;

        tokio::time::timeout(timeout, ctx.write_multiple_registers(start, values))
            .await
            .map_err(|_| FieldbusError::Timeout(timeout))?
            .map_err(|e| FieldbusError::Transport(e.to_string()))?
            .map_err(|e| FieldbusError::Exception(format!("{:?}", e)))
    }

    /// Write a single coil (function code 5).
    pub async fn write_coil(&mut self, address: u16, value: bool) -> Result<(), FieldbusError> {
        let timeout = self.timeout;
        let ctx = self.context()?;

        tokio::time::timeout(timeout, ctx.write_single_coil(address, value))
            .await
            .map_err(|_| FieldbusError::Timeout(timeout))?
            .map_err(|e| FieldbusError::Transport(e.to_string()))?
            .map_err(|e| FieldbusError::Exception(format!("{:?}", e)))
    }

    /// Write multiple coils (function code 15).
    pub async fn write_coils(&mut self, start: u16, values: &[bool]) -> Result<(), FieldbusError> {
        let timeout = self.timeout;
        let ctx = self.context()?;

        tokio::time::timeout(timeout, ctx.write_multiple_coils(start, values))
            .await
            .map_err(|_| FieldbusError::Timeout(timeout))?
            .map_err(|e| FieldbusError::Transport(e.to_string()))?
            .map_err(|e| FieldbusError::Exception(format!("{:?}", e)))
    }

    /// Drop the session. Safe to call when already closed.
    pub async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                debug!(address = %self.address(), error = %e, "Error while disconnecting");
            }
            info!(address = %self.address(), "Modbus connection closed");
        }
    }
}

/// Resolve `host` and open a client context for `slave`.
///
/// Takes owned values so the returned future stays `Send`; the client
/// context is not `Sync`.
async fn open(host: String, port: u16, slave: Slave) -> Result<Context, FieldbusError> {
    let addr = resolve(&host, port).await?;
    tcp::connect_slave(addr, slave)
        .await
        .map_err(|e| FieldbusError::Connection(e.to_string()))
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, FieldbusError> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| FieldbusError::Connection(format!("Cannot resolve {}: {}", host, e)))?
        .next()
        .ok_or_else(|| FieldbusError::Connection(format!("No address found for {}", host)))
}

impl RegisterReader for FieldbusLink {
    async fn read_holding_registers(
        &mut self,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, FieldbusError> {
        FieldbusLink::read_holding_registers(self, start, count).await
    }

    async fn close(&mut self) {
        FieldbusLink::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16) -> ModbusConfig {
        ModbusConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 200,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_requests_without_connection_fail() {
        let mut link = FieldbusLink::new(&config(5020));

        assert!(!link.is_connected());
        assert!(matches!(
            link.read_holding_registers(0, 9).await,
            Err(FieldbusError::NotConnected)
        ));
        assert!(matches!(
            link.write_coil(0, true).await,
            Err(FieldbusError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut link = FieldbusLink::new(&config(5020));
        link.close().await;
        link.close().await;
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused_returns_false() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut link = FieldbusLink::new(&config(port));
        assert!(!link.connect().await);
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_unresolvable_host_returns_false() {
        let mut link = FieldbusLink::new(&ModbusConfig {
            host: "no-such-host.invalid".to_string(),
            ..config(5020)
        });
        let connected = tokio::time::timeout(Duration::from_secs(2), link.connect())
            .await
            .expect("resolution was not bounded by the connect timeout");
        assert!(!connected);
    }

    #[test]
    fn test_address() {
        let link = FieldbusLink::new(&config(1502));
        assert_eq!(link.address(), "127.0.0.1:1502");
    }
}
