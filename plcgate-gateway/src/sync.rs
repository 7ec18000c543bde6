//! Periodic Modbus → address space synchronization.

use std::sync::Arc;
use std::time::Duration;

use plcgate_framework::CancellationToken;
use tracing::{debug, info, warn};

use crate::address_space::AddressSpace;
use crate::codec::{REGISTER_COUNT, START_ADDRESS, SensorReading};
use crate::link::{FieldbusError, RegisterReader};

/// Health of the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// The last cycle read and decoded a complete image.
    Polling,
    /// The last cycle failed to read, or read a short image.
    Degraded,
}

/// Counters kept across cycles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    pub cycles: u64,
    pub successful_cycles: u64,
    pub failed_reads: u64,
    pub decode_failures: u64,
    pub consecutive_failures: u64,
    pub last_error: Option<String>,
}

/// Outcome of a single cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// All five fields decoded and written.
    Updated,
    /// Values were written, but some were defaulted from a short image.
    Partial { received: usize },
    /// The read failed; no node was touched.
    ReadFailed(FieldbusError),
}

/// Copies the register image into the address space on a fixed interval.
///
/// The loop owns its reader. Cycles run strictly one after another.
pub struct SyncLoop<R> {
    reader: R,
    space: Arc<AddressSpace>,
    interval: Duration,
    state: SyncState,
    stats: SyncStats,
}

impl<R: RegisterReader> SyncLoop<R> {
    pub fn new(reader: R, space: Arc<AddressSpace>, interval: Duration) -> Self {
        Self {
            reader,
            space,
            interval,
            state: SyncState::Polling,
            stats: SyncStats::default(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Run one read/decode/write cycle.
    pub async fn poll_once(&mut self) -> CycleOutcome {
        self.stats.cycles += 1;

        let registers = match self
            .reader
            .read_holding_registers(START_ADDRESS, REGISTER_COUNT)
            .await
        {
            Ok(registers) => registers,
            Err(e) => {
                warn!(error = %e, "Failed to read holding registers");
                self.stats.failed_reads += 1;
                self.record_failure(e.to_string());
                return CycleOutcome::ReadFailed(e);
            }
        };

        let decoded = SensorReading::decode(&registers);
        if let Err(e) = self.space.apply_reading(&decoded.reading) {
            // Types are fixed at initialization, so this means a layout/type mismatch
            warn!(error = %e, "Failed to write node value");
        }

        if decoded.is_complete() {
            debug!(
                temperature = decoded.reading.temperature,
                humidity = decoded.reading.humidity,
                pressure = decoded.reading.pressure,
                vibration = decoded.reading.vibration,
                production = decoded.reading.production,
                "Nodes updated"
            );
            self.stats.successful_cycles += 1;
            self.set_state(SyncState::Polling);
            self.stats.consecutive_failures = 0;
            CycleOutcome::Updated
        } else {
            let missing: Vec<_> = decoded.defaulted.iter().map(|f| f.browse_name()).collect();
            warn!(
                received = registers.len(),
                expected = REGISTER_COUNT,
                missing = ?missing,
                "Short register image, missing fields set to zero"
            );
            self.stats.decode_failures += 1;
            self.record_failure(format!(
                "short read: {} of {} registers",
                registers.len(),
                REGISTER_COUNT
            ));
            CycleOutcome::Partial {
                received: registers.len(),
            }
        }
    }

    fn record_failure(&mut self, error: String) {
        self.stats.consecutive_failures += 1;
        self.stats.last_error = Some(error);
        self.set_state(SyncState::Degraded);
    }

    fn set_state(&mut self, state: SyncState) {
        if self.state == state {
            return;
        }

        match state {
            SyncState::Degraded => warn!("Sync degraded, node values may be stale"),
            SyncState::Polling => info!(
                after_failures = self.stats.consecutive_failures,
                "Sync recovered"
            ),
        }
        self.state = state;
    }

    /// Poll until `cancel` fires, then close the reader.
    ///
    /// Cancellation is observed both while reading and while sleeping.
    pub async fn run(mut self, cancel: CancellationToken) -> SyncStats {
        info!(interval = ?self.interval, "Sync loop started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = self.poll_once() => {}
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        self.reader.close().await;

        info!(
            cycles = self.stats.cycles,
            successful = self.stats.successful_cycles,
            failed_reads = self.stats.failed_reads,
            decode_failures = self.stats.decode_failures,
            "Sync loop stopped"
        );

        self.stats
    }
}
