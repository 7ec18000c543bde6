//! The gateway's hierarchical address space.
//!
//! One namespace, one object node and five variable nodes, fixed at
//! initialization. Only values change afterwards. Each variable guards its
//! value with its own lock, so a reader always sees a whole pre- or
//! post-write value for a node, but the five nodes are not updated as a
//! group.

use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use plcgate_common::{
    DataType, NodeClass, NodeDescription, NodeKeyBuilder, NodeSample, Variant,
    current_timestamp_millis,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use crate::codec::{SensorField, SensorReading};
use crate::config::AddressSpaceConfig;

/// URI of namespace 0.
pub const STANDARD_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Address space errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressSpaceError {
    #[error("Node {node} is declared {expected}, refusing {actual} value")]
    TypeMismatch {
        node: String,
        expected: DataType,
        actual: DataType,
    },
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Malformed node id: {0}")]
    MalformedNodeId(String),
}

/// Namespace URIs indexed by namespace index.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    uris: Vec<String>,
}

impl NamespaceTable {
    /// Table holding the standard namespace (0) and the server's own (1).
    pub fn new(server_uri: impl Into<String>) -> Self {
        Self {
            uris: vec![STANDARD_NAMESPACE_URI.to_string(), server_uri.into()],
        }
    }

    /// Register a namespace URI, returning its index. Registering the same
    /// URI twice returns the existing index.
    pub fn register(&mut self, uri: impl Into<String>) -> u16 {
        let uri = uri.into();
        if let Some(index) = self.index_of(&uri) {
            return index;
        }
        self.uris.push(uri);
        (self.uris.len() - 1) as u16
    }

    pub fn index_of(&self, uri: &str) -> Option<u16> {
        self.uris.iter().position(|u| u == uri).map(|i| i as u16)
    }

    pub fn uri(&self, index: u16) -> Option<&str> {
        self.uris.get(usize::from(index)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

/// String node identifier: `ns=<index>;s=<identifier>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: String,
}

impl NodeId {
    pub fn new(namespace: u16, identifier: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};s={}", self.namespace, self.identifier)
    }
}

impl FromStr for NodeId {
    type Err = AddressSpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AddressSpaceError::MalformedNodeId(s.to_string());

        let (ns, id) = s.split_once(';').ok_or_else(malformed)?;
        let namespace = ns
            .strip_prefix("ns=")
            .and_then(|n| n.parse::<u16>().ok())
            .ok_or_else(malformed)?;
        let identifier = id.strip_prefix("s=").filter(|i| !i.is_empty()).ok_or_else(malformed)?;

        Ok(NodeId::new(namespace, identifier))
    }
}

/// A value together with the time it was written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataValue {
    pub value: Variant,
    /// Unix epoch milliseconds, 0 if never written.
    pub source_timestamp: i64,
}

/// A folder-like node grouping variables.
#[derive(Debug)]
pub struct ObjectNode {
    pub node_id: NodeId,
    pub browse_name: String,
}

/// A typed variable node.
#[derive(Debug)]
pub struct VariableNode {
    node_id: NodeId,
    browse_name: String,
    data_type: DataType,
    writable: bool,
    parent: NodeId,
    key: String,
    value: RwLock<DataValue>,
}

impl VariableNode {
    fn new(parent: &ObjectNode, keys: &NodeKeyBuilder, field: SensorField, data_type: DataType) -> Self {
        let browse_name = field.browse_name().to_string();
        Self {
            node_id: NodeId::new(
                parent.node_id.namespace,
                format!("{}.{}", parent.browse_name, browse_name),
            ),
            key: keys.node_key(&parent.browse_name, &browse_name),
            browse_name,
            data_type,
            writable: true,
            parent: parent.node_id.clone(),
            value: RwLock::new(DataValue {
                value: data_type.default_value(),
                source_timestamp: 0,
            }),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn browse_name(&self) -> &str {
        &self.browse_name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Key expression the node is published under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn read(&self) -> DataValue {
        *self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, value: Variant) -> Result<DataValue, AddressSpaceError> {
        if value.data_type() != self.data_type {
            return Err(AddressSpaceError::TypeMismatch {
                node: self.node_id.to_string(),
                expected: self.data_type,
                actual: value.data_type(),
            });
        }

        let data_value = DataValue {
            value,
            source_timestamp: current_timestamp_millis(),
        };
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = data_value;
        Ok(data_value)
    }

    /// Current value as a publishable sample.
    pub fn sample(&self) -> NodeSample {
        let current = self.read();
        NodeSample {
            node_id: self.node_id.to_string(),
            browse_name: self.browse_name.clone(),
            value: current.value,
            source_timestamp: current.source_timestamp,
            server_timestamp: current_timestamp_millis(),
        }
    }

    pub fn describe(&self) -> NodeDescription {
        NodeDescription {
            node_id: self.node_id.to_string(),
            browse_name: self.browse_name.clone(),
            node_class: NodeClass::Variable,
            data_type: Some(self.data_type),
            writable: self.writable,
            parent: Some(self.parent.to_string()),
            key: Some(self.key.clone()),
        }
    }
}

/// The five sensor variables, one per register field.
#[derive(Debug)]
pub struct SensorNodes {
    pub temperature: VariableNode,
    pub humidity: VariableNode,
    pub pressure: VariableNode,
    pub vibration: VariableNode,
    pub production: VariableNode,
}

impl SensorNodes {
    pub fn get(&self, field: SensorField) -> &VariableNode {
        match field {
            SensorField::Temperature => &self.temperature,
            SensorField::Humidity => &self.humidity,
            SensorField::Pressure => &self.pressure,
            SensorField::Vibration => &self.vibration,
            SensorField::Production => &self.production,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SensorField, &VariableNode)> {
        SensorField::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

/// Notification sent after a node value changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeChange {
    pub field: SensorField,
    pub value: DataValue,
}

/// The served address space.
#[derive(Debug)]
pub struct AddressSpace {
    server_name: String,
    endpoint: String,
    namespaces: NamespaceTable,
    namespace_index: u16,
    keys: NodeKeyBuilder,
    object: ObjectNode,
    nodes: SensorNodes,
    changes: broadcast::Sender<NodeChange>,
}

impl AddressSpace {
    /// Build the namespace, the object node and its five variables.
    pub fn initialize(config: &AddressSpaceConfig) -> Self {
        let mut namespaces = NamespaceTable::new(format!(
            "urn:plcgate:{}",
            config.server_name.replace(' ', "-")
        ));
        let namespace_index = namespaces.register(&config.namespace_uri);
        let keys = NodeKeyBuilder::new(&config.key_prefix);

        let object = ObjectNode {
            node_id: NodeId::new(namespace_index, &config.object_name),
            browse_name: config.object_name.clone(),
        };

        let variable = |field, data_type| VariableNode::new(&object, &keys, field, data_type);
        let nodes = SensorNodes {
            temperature: variable(SensorField::Temperature, DataType::Double),
            humidity: variable(SensorField::Humidity, DataType::Double),
            pressure: variable(SensorField::Pressure, DataType::Double),
            vibration: variable(SensorField::Vibration, DataType::Double),
            production: variable(SensorField::Production, DataType::Int64),
        };

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        let space = Self {
            server_name: config.server_name.clone(),
            endpoint: config.endpoint(),
            namespaces,
            namespace_index,
            keys,
            object,
            nodes,
            changes,
        };

        for (_, node) in space.nodes.iter() {
            info!(
                node = %node.browse_name(),
                node_id = %node.node_id(),
                data_type = %node.data_type(),
                key = %node.key(),
                "Variable node created"
            );
        }

        space
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Locator of the serving endpoint.
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn namespace_index(&self) -> u16 {
        self.namespace_index
    }

    pub fn namespace_uri(&self) -> &str {
        self.namespaces.uri(self.namespace_index).unwrap_or_default()
    }

    pub fn keys(&self) -> &NodeKeyBuilder {
        &self.keys
    }

    pub fn object(&self) -> &ObjectNode {
        &self.object
    }

    pub fn nodes(&self) -> &SensorNodes {
        &self.nodes
    }

    pub fn node(&self, field: SensorField) -> &VariableNode {
        self.nodes.get(field)
    }

    /// Write a value into a node, enforcing its declared type.
    pub fn write_node_value(
        &self,
        field: SensorField,
        value: Variant,
    ) -> Result<(), AddressSpaceError> {
        let value = self.nodes.get(field).write(value)?;
        // No receivers is fine: nobody is serving yet.
        let _ = self.changes.send(NodeChange { field, value });
        Ok(())
    }

    /// Write all five fields of a decoded reading.
    ///
    /// Every field is attempted; the first error, if any, is returned.
    pub fn apply_reading(&self, reading: &SensorReading) -> Result<(), AddressSpaceError> {
        let writes = [
            (SensorField::Temperature, Variant::Double(reading.temperature)),
            (SensorField::Humidity, Variant::Double(reading.humidity)),
            (SensorField::Pressure, Variant::Double(reading.pressure)),
            (SensorField::Vibration, Variant::Double(reading.vibration)),
            (SensorField::Production, Variant::from_register(reading.production)),
        ];

        let mut first_error = None;
        for (field, value) in writes {
            if let Err(e) = self.write_node_value(field, value) {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub fn read_node_value(&self, field: SensorField) -> DataValue {
        self.nodes.get(field).read()
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeChange> {
        self.changes.subscribe()
    }

    /// Resolve `<Object>/<Variable>`.
    pub fn find_by_browse_path(&self, path: &str) -> Option<SensorField> {
        let (object, variable) = path.trim_matches('/').split_once('/')?;
        if object != self.object.browse_name {
            return None;
        }
        SensorField::from_browse_name(variable)
    }

    /// Resolve a concrete key expression to a variable.
    pub fn find_by_key(&self, key: &str) -> Option<SensorField> {
        let parsed = self.keys.parse(key)?;
        self.find_by_browse_path(&format!("{}/{}", parsed.object, parsed.variable))
    }

    pub fn find_by_node_id(&self, node_id: &str) -> Result<SensorField, AddressSpaceError> {
        let id: NodeId = node_id.parse()?;
        self.nodes
            .iter()
            .find(|(_, node)| node.node_id == id)
            .map(|(field, _)| field)
            .ok_or_else(|| AddressSpaceError::UnknownNode(node_id.to_string()))
    }

    /// Describe the object node and all its variables.
    pub fn browse(&self) -> Vec<NodeDescription> {
        let mut nodes = vec![NodeDescription {
            node_id: self.object.node_id.to_string(),
            browse_name: self.object.browse_name.clone(),
            node_class: NodeClass::Object,
            data_type: None,
            writable: false,
            parent: None,
            key: None,
        }];
        nodes.extend(self.nodes.iter().map(|(_, node)| node.describe()));
        nodes
    }
}
