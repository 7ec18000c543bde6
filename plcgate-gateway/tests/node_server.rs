//! Serving the address space over Zenoh.
//!
//! Zenoh requires a multi-thread tokio runtime. Each test uses a unique key
//! prefix to avoid interference.

use std::sync::Arc;
use std::time::Duration;

use plcgate_common::{Format, NodeClass, NodeDescription, NodeSample, Variant, decode_auto};
use plcgate_framework::{CancellationToken, Publisher};
use plcgate_gateway::address_space::AddressSpace;
use plcgate_gateway::codec::SensorField;
use plcgate_gateway::config::AddressSpaceConfig;
use plcgate_gateway::server::NodeServer;

fn unique_prefix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}/opcua", nanos)
}

async fn serve(format: Format) -> (Arc<zenoh::Session>, Arc<AddressSpace>, CancellationToken) {
    let session = Arc::new(
        zenoh::open(zenoh::Config::default())
            .await
            .expect("Failed to open Zenoh session"),
    );

    let config = AddressSpaceConfig {
        key_prefix: unique_prefix(),
        ..Default::default()
    };
    let space = Arc::new(AddressSpace::initialize(&config));

    let server = NodeServer::start(space.clone(), Publisher::new(session.clone(), format))
        .await
        .expect("Failed to start node server");

    let cancel = CancellationToken::new();
    tokio::spawn(server.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    (session, space, cancel)
}

async fn query<T: serde::de::DeserializeOwned>(session: &zenoh::Session, key: &str) -> Vec<T> {
    let replies = session.get(key).await.expect("Failed to send query");

    let mut values = Vec::new();
    while let Ok(reply) = replies.recv_async().await {
        let sample = reply.result().expect("Error reply");
        values.push(decode_auto(&sample.payload().to_bytes()).expect("Failed to decode reply"));
    }
    values
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_query_returns_current_value() {
    let (session, space, cancel) = serve(Format::Json).await;
    space
        .write_node_value(SensorField::Temperature, Variant::Double(22.0))
        .unwrap();

    let key = space.node(SensorField::Temperature).key().to_string();
    let samples: Vec<NodeSample> = query(&session, &key).await;

    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].node_id, "ns=2;s=ModbusPLC.Temperature");
    assert_eq!(samples[0].value, Variant::Double(22.0));
    assert!(samples[0].source_timestamp > 0);

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wildcard_query_returns_every_variable() {
    let (session, space, cancel) = serve(Format::Cbor).await;

    let wildcard = space.keys().object_wildcard("ModbusPLC");
    let samples: Vec<NodeSample> = query(&session, &wildcard).await;

    let mut names: Vec<_> = samples.iter().map(|s| s.browse_name.clone()).collect();
    names.sort();
    assert_eq!(
        names,
        ["Humidity", "Pressure", "Production", "Temperature", "Vibration"]
    );

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_browse_describes_address_space() {
    let (session, space, cancel) = serve(Format::Json).await;

    let replies: Vec<Vec<NodeDescription>> = query(&session, &space.keys().browse_key()).await;

    assert_eq!(replies.len(), 1);
    let nodes = &replies[0];
    assert_eq!(nodes.len(), 6);
    assert_eq!(nodes[0].node_class, NodeClass::Object);
    assert_eq!(
        nodes[5].key.as_deref(),
        Some(space.node(SensorField::Production).key())
    );

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_value_changes_are_published() {
    let (session, space, cancel) = serve(Format::Json).await;

    let subscriber = session
        .declare_subscriber(space.node(SensorField::Production).key())
        .await
        .expect("Failed to create subscriber");
    tokio::time::sleep(Duration::from_millis(100)).await;

    space
        .write_node_value(SensorField::Production, Variant::Int64(75))
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
        .await
        .expect("Timeout waiting for sample")
        .expect("Failed to receive sample");

    let sample: NodeSample = decode_auto(&received.payload().to_bytes()).unwrap();
    assert_eq!(sample.browse_name, "Production");
    assert_eq!(sample.value, Variant::Int64(75));

    cancel.cancel();
}
