//! Value model shared by the gateway's address space and its clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Declared type of a variable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 64-bit IEEE-754 float.
    Double,
    /// Signed 64-bit integer.
    Int64,
}

impl DataType {
    /// Get the string representation used in payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Double => "double",
            DataType::Int64 => "int64",
        }
    }

    /// The value a freshly created node of this type holds.
    pub fn default_value(&self) -> Variant {
        match self {
            DataType::Double => Variant::Double(0.0),
            DataType::Int64 => Variant::Int64(0),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed node value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Variant {
    Double(f64),
    Int64(i64),
}

impl Variant {
    /// The type tag carried by this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Variant::Double(_) => DataType::Double,
            Variant::Int64(_) => DataType::Int64,
        }
    }

    /// Widen a raw 16-bit register into an `Int64` value.
    pub fn from_register(raw: u16) -> Self {
        Variant::Int64(i64::from(raw))
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int64(v)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Double(v) => write!(f, "{:.2}", v),
            Variant::Int64(v) => write!(f, "{}", v),
        }
    }
}

/// Kind of node in the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeClass {
    Object,
    Variable,
}

/// Static description of a node, returned by browse requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Stable node identifier (e.g. `ns=2;s=ModbusPLC.Temperature`).
    pub node_id: String,

    /// Browse name (e.g. `Temperature`).
    pub browse_name: String,

    pub node_class: NodeClass,

    /// Declared value type. `None` for object nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,

    #[serde(default)]
    pub writable: bool,

    /// Node id of the parent object, `None` for top-level objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Key expression under which the node's value is published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A published or queried node value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSample {
    pub node_id: String,

    pub browse_name: String,

    pub value: Variant,

    /// Unix epoch milliseconds of the last write into the node.
    pub source_timestamp: i64,

    /// Unix epoch milliseconds when this sample was emitted.
    pub server_timestamp: i64,
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_data_type() {
        assert_eq!(Variant::Double(1.5).data_type(), DataType::Double);
        assert_eq!(Variant::Int64(3).data_type(), DataType::Int64);
    }

    #[test]
    fn test_register_widening() {
        assert_eq!(Variant::from_register(75), Variant::Int64(75));
        assert_eq!(Variant::from_register(u16::MAX), Variant::Int64(65535));
    }

    #[test]
    fn test_variant_json_shape() {
        let json = serde_json::to_string(&Variant::Int64(100)).unwrap();
        assert_eq!(json, r#"{"type":"int64","value":100}"#);

        let back: Variant = serde_json::from_str(r#"{"type":"double","value":22.0}"#).unwrap();
        assert_eq!(back, Variant::Double(22.0));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(DataType::Double.default_value(), Variant::Double(0.0));
        assert_eq!(DataType::Int64.default_value(), Variant::Int64(0));
    }

    #[test]
    fn test_object_description_omits_value_fields() {
        let desc = NodeDescription {
            node_id: "ns=2;s=ModbusPLC".to_string(),
            browse_name: "ModbusPLC".to_string(),
            node_class: NodeClass::Object,
            data_type: None,
            writable: false,
            parent: None,
            key: None,
        };
        let json = serde_json::to_string(&desc).unwrap();
        assert!(!json.contains("data_type"));
        assert!(json.contains("\"node_class\":\"object\""));
    }
}
