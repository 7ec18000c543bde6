//! Gateway scenarios against an in-process Modbus TCP device.

mod common;

use std::sync::Arc;
use std::time::Duration;

use plcgate_common::Variant;
use plcgate_framework::CancellationToken;
use plcgate_gateway::address_space::AddressSpace;
use plcgate_gateway::codec::{SensorField, SensorReading};
use plcgate_gateway::config::AddressSpaceConfig;
use plcgate_gateway::link::{FieldbusError, FieldbusLink};
use plcgate_gateway::service::{connect_with_retry, run_sync};
use plcgate_gateway::simulator::SensorSimulator;
use plcgate_gateway::sync::{CycleOutcome, SyncLoop, SyncState};

use common::{TestDevice, free_port, modbus_config, start};

fn reference_reading() -> SensorReading {
    SensorReading {
        temperature: 22.0,
        humidity: 45.0,
        pressure: 1005.0,
        vibration: 1.5,
        production: 75,
    }
}

fn address_space() -> Arc<AddressSpace> {
    Arc::new(AddressSpace::initialize(&AddressSpaceConfig::default()))
}

async fn wait_for_value(space: &AddressSpace, field: SensorField, expected: Variant) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while space.read_node_value(field).value != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "{field} never reached {expected}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_link_reads_and_writes() {
    let device = TestDevice::new(16, 8);
    let (addr, _server) = start(device.clone()).await;

    let mut link = FieldbusLink::new(&modbus_config(addr.port()));
    assert!(link.connect().await);
    assert!(link.is_connected());

    link.write_registers(0, &[1, 2, 3]).await.unwrap();
    assert_eq!(link.read_holding_registers(0, 4).await.unwrap(), vec![1, 2, 3, 0]);

    link.write_coil(3, true).await.unwrap();
    link.write_coils(5, &[true, true]).await.unwrap();
    assert_eq!(
        device.coils(),
        vec![false, false, false, true, false, true, true, false]
    );

    link.close().await;
    assert!(!link.is_connected());
}

#[tokio::test]
async fn test_exception_response_is_reported() {
    let device = TestDevice::new(4, 0);
    let (addr, _server) = start(device).await;

    let mut link = FieldbusLink::new(&modbus_config(addr.port()));
    assert!(link.connect().await);

    assert!(matches!(
        link.read_holding_registers(0, 9).await,
        Err(FieldbusError::Exception(_))
    ));
}

#[tokio::test]
async fn test_sync_cycle_end_to_end() {
    let device = TestDevice::new(16, 0);
    device.set_registers(0, &reference_reading().encode());
    let (addr, _server) = start(device).await;

    let mut link = FieldbusLink::new(&modbus_config(addr.port()));
    assert!(link.connect().await);

    let space = address_space();
    let mut sync = SyncLoop::new(link, space.clone(), Duration::from_secs(1));

    assert!(matches!(sync.poll_once().await, CycleOutcome::Updated));
    assert_eq!(sync.state(), SyncState::Polling);

    let value = |field| space.read_node_value(field).value;
    assert_eq!(value(SensorField::Temperature), Variant::Double(22.0));
    assert_eq!(value(SensorField::Humidity), Variant::Double(45.0));
    assert_eq!(value(SensorField::Pressure), Variant::Double(1005.0));
    assert_eq!(value(SensorField::Vibration), Variant::Double(1.5));
    assert_eq!(value(SensorField::Production), Variant::Int64(75));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_startup_retries_until_device_appears() {
    let port = free_port().await;
    let space = address_space();
    let cancel = CancellationToken::new();

    let sync = tokio::spawn(run_sync(modbus_config(port), space.clone(), cancel.clone()));

    // Let at least one attempt be refused before the device comes up
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        space.read_node_value(SensorField::Temperature).value,
        Variant::Double(0.0)
    );

    let device = TestDevice::new(16, 0);
    device.set_registers(0, &reference_reading().encode());
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let _server = common::serve(listener, device);

    wait_for_value(&space, SensorField::Temperature, Variant::Double(22.0)).await;
    wait_for_value(&space, SensorField::Production, Variant::Int64(75)).await;

    cancel.cancel();
    let stats = tokio::time::timeout(Duration::from_secs(5), sync)
        .await
        .expect("sync did not stop after cancellation")
        .unwrap()
        .expect("sync was cancelled before connecting");
    assert!(stats.successful_cycles >= 1);
}

#[tokio::test]
async fn test_connect_with_retry_counts_attempts() {
    let port = free_port().await;
    let mut link = FieldbusLink::new(&modbus_config(port));
    let cancel = CancellationToken::new();

    let device = TestDevice::new(16, 0);
    let bring_up = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        common::serve(listener, device)
    });

    let attempts = connect_with_retry(&mut link, Duration::from_secs(1), &cancel)
        .await
        .unwrap();
    assert!(attempts >= 2);
    assert!(link.is_connected());

    let _server = bring_up.await.unwrap();
}

#[tokio::test]
async fn test_simulator_writes_image_and_coils() {
    let device = TestDevice::new(16, 4);
    let (addr, _server) = start(device.clone()).await;

    let mut link = FieldbusLink::new(&modbus_config(addr.port()));
    assert!(link.connect().await);

    SensorSimulator::write_startup_coils(&mut link).await.unwrap();
    assert_eq!(device.coils()[..2], [true, false]);

    let mut simulator = SensorSimulator::with_seed(3);
    let reading = simulator.write_once(&mut link).await.unwrap();

    let image = device.registers();
    assert_eq!(image[..9], reading.encode());

    let decoded = SensorReading::decode(&image[..9]);
    assert!(decoded.is_complete());
    assert_eq!(decoded.reading.production, reading.production);
    assert_eq!(decoded.reading.temperature, f64::from(reading.temperature as f32));
}

#[tokio::test]
async fn test_simulator_feeds_gateway() {
    let device = TestDevice::new(16, 4);
    let (addr, _server) = start(device).await;

    let mut writer = FieldbusLink::new(&modbus_config(addr.port()));
    assert!(writer.connect().await);
    let reading = SensorSimulator::with_seed(11).write_once(&mut writer).await.unwrap();

    let mut reader = FieldbusLink::new(&modbus_config(addr.port()));
    assert!(reader.connect().await);
    let space = address_space();
    let mut sync = SyncLoop::new(reader, space.clone(), Duration::from_secs(1));
    sync.poll_once().await;

    assert_eq!(
        space.read_node_value(SensorField::Humidity).value,
        Variant::Double(f64::from(reading.humidity as f32))
    );
    assert_eq!(
        space.read_node_value(SensorField::Production).value,
        Variant::Int64(i64::from(reading.production))
    );
}
