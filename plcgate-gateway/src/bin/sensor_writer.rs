//! Sensor writer: fills a Modbus device's holding registers with simulated
//! readings every few seconds.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use plcgate_common::{LoggingConfig, env_override, init_tracing};
use plcgate_framework::CancellationToken;
use plcgate_gateway::config::ModbusConfig;
use plcgate_gateway::link::FieldbusLink;
use plcgate_gateway::simulator::SensorSimulator;
use tracing::{info, warn};

/// Writes simulated sensor data to a Modbus TCP device.
#[derive(Parser, Debug)]
#[command(name = "plcgate-sensor-writer")]
#[command(version)]
struct Args {
    /// Device host. Falls back to `MODBUS_HOST`, then `localhost`.
    #[arg(long)]
    host: Option<String>,

    /// Device port. Falls back to `MODBUS_PORT`, then 502.
    #[arg(long)]
    port: Option<u16>,

    /// Modbus unit id.
    #[arg(long, default_value_t = 1)]
    unit_id: u8,

    /// Seconds between writes (at least 1).
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&LoggingConfig {
        level: args.log_level.clone(),
        ..Default::default()
    })
    .context("Failed to initialize tracing")?;

    let host = match args.host {
        Some(host) => host,
        None => env_override::<String>("MODBUS_HOST")?.unwrap_or_else(|| "localhost".to_string()),
    };
    let port = match args.port {
        Some(port) => port,
        None => env_override::<u16>("MODBUS_PORT")?.unwrap_or(502),
    };

    let config = ModbusConfig {
        host,
        port,
        unit_id: args.unit_id,
        ..Default::default()
    };

    let mut link = FieldbusLink::new(&config);
    if !link.connect().await {
        bail!("Could not connect to Modbus device at {}", config.address());
    }

    if let Err(e) = SensorSimulator::write_startup_coils(&mut link).await {
        warn!(error = %e, "Failed to write startup coils");
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        on_signal.cancel();
    });

    let mut simulator = SensorSimulator::new();
    let written = simulator
        .run(&mut link, Duration::from_secs(args.interval_secs), &cancel)
        .await;

    link.close().await;
    info!(written, "Sensor writer stopped");

    Ok(())
}
