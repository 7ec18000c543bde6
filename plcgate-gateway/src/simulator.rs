//! Sensor simulator: the producer side of the register image.
//!
//! Writes random but plausible readings into the device's holding registers
//! with the same layout the gateway decodes.

use std::ops::RangeInclusive;
use std::time::Duration;

use plcgate_framework::CancellationToken;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::codec::{START_ADDRESS, SensorReading};
use crate::link::{FieldbusError, FieldbusLink};

pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 20.0..=30.0;
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 40.0..=60.0;
pub const PRESSURE_RANGE: RangeInclusive<f64> = 1000.0..=1020.0;
pub const VIBRATION_RANGE: RangeInclusive<f64> = 0.0..=10.0;
pub const PRODUCTION_RANGE: RangeInclusive<u16> = 50..=150;

/// Coil states written once at startup, as `(address, value)`.
pub const STARTUP_COILS: [(u16, bool); 2] = [(0, true), (1, false)];

/// Generates readings and writes them to a device.
pub struct SensorSimulator {
    rng: StdRng,
}

impl Default for SensorSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSimulator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic simulator for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_reading(&mut self) -> SensorReading {
        SensorReading {
            temperature: self.rng.random_range(TEMPERATURE_RANGE),
            humidity: self.rng.random_range(HUMIDITY_RANGE),
            pressure: self.rng.random_range(PRESSURE_RANGE),
            vibration: self.rng.random_range(VIBRATION_RANGE),
            production: self.rng.random_range(PRODUCTION_RANGE),
        }
    }

    /// Generate one reading and write its image with a single FC16 request.
    pub async fn write_once(
        &mut self,
        link: &mut FieldbusLink,
    ) -> Result<SensorReading, FieldbusError> {
        let reading = self.next_reading();
        link.write_registers(START_ADDRESS, &reading.encode()).await?;

        info!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            pressure = reading.pressure,
            vibration = reading.vibration,
            production = reading.production,
            "Sensor data written"
        );

        Ok(reading)
    }

    /// Set the demonstration coils: coil 0 on, coil 1 off.
    pub async fn write_startup_coils(link: &mut FieldbusLink) -> Result<(), FieldbusError> {
        for (address, value) in STARTUP_COILS {
            link.write_coil(address, value).await?;
            info!(address, value, "Coil written");
        }
        Ok(())
    }

    /// Write a reading every `interval` until cancelled.
    ///
    /// Failed writes are logged and retried on the next tick. Returns the
    /// number of successful writes.
    pub async fn run(
        &mut self,
        link: &mut FieldbusLink,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> u64 {
        let mut written = 0u64;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                result = self.write_once(link) => match result {
                    Ok(_) => written += 1,
                    Err(e) => warn!(error = %e, "Failed to write sensor data"),
                },
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }

        written
    }
}
