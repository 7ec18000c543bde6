//! plcgate gateway.
//!
//! Polls a Modbus TCP device and serves its sensor values as a hierarchical
//! address space over Zenoh.

use anyhow::{Context, Result};
use plcgate_framework::{ServiceArgs, ServiceConfig, ServiceRunner};
use plcgate_gateway::config::GatewayConfig;
use plcgate_gateway::service::GatewayService;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServiceArgs::parse_with_default("gateway.json5");

    let config = GatewayConfig::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    let format = config.serialization;

    let runner = ServiceRunner::new_with_args("plcgate-gateway", config, Some(&args), format)
        .await
        .context("Failed to start service runtime")?;

    // The address space is fixed before anything is served
    let service = GatewayService::new(runner.config().clone());

    service.run(runner).await.context("Gateway failed")?;

    Ok(())
}
