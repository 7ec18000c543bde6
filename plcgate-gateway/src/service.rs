//! Gateway wiring: address space, node server, fieldbus link and sync loop.

use std::sync::Arc;
use std::time::Duration;

use plcgate_framework::{CancellationToken, Publisher, Result, ServiceRunner};
use tracing::{info, warn};

use crate::address_space::AddressSpace;
use crate::config::{GatewayConfig, ModbusConfig};
use crate::link::FieldbusLink;
use crate::server::NodeServer;
use crate::sync::{SyncLoop, SyncStats};

/// Connect `link`, retrying every `delay` until it succeeds.
///
/// Returns the number of attempts it took, or `None` if `cancel` fired
/// first.
pub async fn connect_with_retry(
    link: &mut FieldbusLink,
    delay: Duration,
    cancel: &CancellationToken,
) -> Option<u32> {
    let mut attempts = 0u32;

    loop {
        attempts = attempts.saturating_add(1);

        let connected = tokio::select! {
            () = cancel.cancelled() => return None,
            connected = link.connect() => connected,
        };
        if connected {
            return Some(attempts);
        }

        warn!(
            address = %link.address(),
            attempts,
            retry_in = ?delay,
            "Modbus device unreachable, retrying"
        );

        tokio::select! {
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Connect to the device, then keep the address space in sync until
/// cancelled.
///
/// Returns `None` when cancelled before the first connection succeeded.
pub async fn run_sync(
    modbus: ModbusConfig,
    space: Arc<AddressSpace>,
    cancel: CancellationToken,
) -> Option<SyncStats> {
    let mut link = FieldbusLink::new(&modbus);

    info!(address = %link.address(), unit_id = modbus.unit_id, "Connecting to Modbus device");
    let attempts = connect_with_retry(&mut link, modbus.retry_delay(), &cancel).await?;
    info!(attempts, "Modbus device reachable, starting sync");

    let sync = SyncLoop::new(link, space, modbus.poll_interval());
    Some(sync.run(cancel).await)
}

/// The gateway service.
pub struct GatewayService {
    config: GatewayConfig,
    space: Arc<AddressSpace>,
}

impl GatewayService {
    /// Build the address space from the configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let space = Arc::new(AddressSpace::initialize(&config.address_space));
        Self { config, space }
    }

    pub fn space(&self) -> &Arc<AddressSpace> {
        &self.space
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Start serving the address space through `publisher`'s session.
    pub async fn start_server(&self, publisher: Publisher) -> Result<NodeServer> {
        NodeServer::start(self.space.clone(), publisher).await
    }

    /// Run the gateway until Ctrl+C.
    ///
    /// Only a node server failure is fatal. An unreachable device is retried
    /// in the background while the address space is already served.
    pub async fn run(self, mut runner: ServiceRunner<GatewayConfig>) -> Result<()> {
        let server = match self.start_server(runner.publisher()).await {
            Ok(server) => server,
            Err(e) => {
                if let Err(status_err) = runner.status().publish_error(e.to_string()).await {
                    warn!(error = %status_err, "Failed to publish error status");
                }
                return Err(e);
            }
        };
        let server_cancel = runner.child_token();
        runner.spawn("node-server", server.run(server_cancel));

        let modbus = self.config.modbus.clone();
        let space = self.space.clone();
        let cancel = runner.child_token();
        runner.spawn("sync", async move {
            if run_sync(modbus, space, cancel).await.is_none() {
                info!("Cancelled before the Modbus device became reachable");
            }
        });

        let metadata = serde_json::json!({
            "modbus": self.config.modbus.address(),
            "endpoint": self.space.endpoint_url(),
            "server_name": self.space.server_name(),
            "namespace": self.space.namespace_uri(),
            "namespace_index": self.space.namespace_index(),
            "nodes": self.space.nodes().iter().count(),
        });

        runner.run_with_metadata(Some(metadata)).await
    }
}
