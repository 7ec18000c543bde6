//! Configuration for the gateway.
//!
//! Every section has defaults, so the gateway runs without a config file.
//! The environment variables `MODBUS_HOST`, `MODBUS_PORT`, `OPCUA_HOST` and
//! `OPCUA_PORT` override the file.

use std::time::Duration;

use plcgate_common::{Format, KEY_PREFIX, LoggingConfig, ZenohConfig, env_override_with};
use plcgate_framework::{ServiceConfig, ServiceError};
use serde::{Deserialize, Serialize};

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Zenoh session settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Modbus TCP link settings
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Served address space settings
    #[serde(default)]
    pub address_space: AddressSpaceConfig,

    /// Payload format for node samples
    #[serde(default)]
    pub serialization: Format,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Modbus TCP link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Host address (IP or hostname)
    #[serde(default = "default_modbus_host")]
    pub host: String,

    /// TCP port
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Modbus unit/slave ID (1-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Connect and per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Poll interval in seconds
    #[serde(default = "default_interval_secs")]
    pub poll_interval_secs: u64,

    /// Delay between startup connection attempts in seconds
    #[serde(default = "default_interval_secs")]
    pub retry_delay_secs: u64,
}

fn default_modbus_host() -> String {
    "modbus-device".to_string()
}

fn default_modbus_port() -> u16 {
    5020
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_interval_secs() -> u64 {
    5
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            host: default_modbus_host(),
            port: default_modbus_port(),
            unit_id: default_unit_id(),
            timeout_ms: default_timeout_ms(),
            poll_interval_secs: default_interval_secs(),
            retry_delay_secs: default_interval_secs(),
        }
    }
}

impl ModbusConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// `host:port` for logs and status.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Address space (serving side) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSpaceConfig {
    /// Interface the endpoint listens on
    #[serde(default = "default_endpoint_host")]
    pub host: String,

    /// TCP port the endpoint listens on
    #[serde(default = "default_endpoint_port")]
    pub port: u16,

    /// Key expression prefix for all nodes
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Namespace URI registered for the gateway's nodes
    #[serde(default = "default_namespace_uri")]
    pub namespace_uri: String,

    /// Human-readable server name
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Browse name of the object node holding the variables
    #[serde(default = "default_object_name")]
    pub object_name: String,
}

fn default_endpoint_host() -> String {
    "0.0.0.0".to_string()
}

fn default_endpoint_port() -> u16 {
    4840
}

fn default_key_prefix() -> String {
    KEY_PREFIX.to_string()
}

fn default_namespace_uri() -> String {
    "http://pearl-factory.opcua".to_string()
}

fn default_server_name() -> String {
    "Pearl Factory OPC-UA Server".to_string()
}

fn default_object_name() -> String {
    "ModbusPLC".to_string()
}

impl Default for AddressSpaceConfig {
    fn default() -> Self {
        Self {
            host: default_endpoint_host(),
            port: default_endpoint_port(),
            key_prefix: default_key_prefix(),
            namespace_uri: default_namespace_uri(),
            server_name: default_server_name(),
            object_name: default_object_name(),
        }
    }
}

impl AddressSpaceConfig {
    /// Zenoh locator the endpoint listens on.
    pub fn endpoint(&self) -> String {
        format!("tcp/{}:{}", self.host, self.port)
    }
}

impl ServiceConfig for GatewayConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.address_space.key_prefix
    }

    /// Apply `MODBUS_*`/`OPCUA_*` overrides from the process environment,
    /// then add the address-space endpoint to the Zenoh listen list.
    fn apply_env(&mut self) -> plcgate_framework::Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn validate(&self) -> plcgate_framework::Result<()> {
        let modbus = &self.modbus;

        if modbus.host.trim().is_empty() {
            return Err(ServiceError::validation("modbus.host cannot be empty"));
        }
        if modbus.port == 0 {
            return Err(ServiceError::validation("modbus.port cannot be 0"));
        }
        if !(1..=247).contains(&modbus.unit_id) {
            return Err(ServiceError::validation(format!(
                "modbus.unit_id must be 1-247, got {}",
                modbus.unit_id
            )));
        }
        if modbus.timeout_ms == 0 {
            return Err(ServiceError::validation("modbus.timeout_ms cannot be 0"));
        }
        if modbus.poll_interval_secs == 0 {
            return Err(ServiceError::validation(
                "modbus.poll_interval_secs cannot be 0",
            ));
        }
        if modbus.retry_delay_secs == 0 {
            return Err(ServiceError::validation("modbus.retry_delay_secs cannot be 0"));
        }

        let space = &self.address_space;

        if space.port == 0 {
            return Err(ServiceError::validation("address_space.port cannot be 0"));
        }
        if space.key_prefix.trim_matches('/').is_empty() {
            return Err(ServiceError::validation(
                "address_space.key_prefix cannot be empty",
            ));
        }
        if space.key_prefix.starts_with('/')
            || space.key_prefix.ends_with('/')
            || space.key_prefix.contains("//")
        {
            return Err(ServiceError::validation(format!(
                "address_space.key_prefix '{}' must not have empty segments",
                space.key_prefix
            )));
        }
        if space.key_prefix.contains(['*', '$', '?', '#']) {
            return Err(ServiceError::validation(format!(
                "address_space.key_prefix '{}' must not contain wildcards",
                space.key_prefix
            )));
        }
        if space.object_name.is_empty() || space.object_name.contains('/') || space.object_name == "@" {
            return Err(ServiceError::validation(format!(
                "address_space.object_name '{}' is not a valid browse name",
                space.object_name
            )));
        }
        if space.namespace_uri.trim().is_empty() {
            return Err(ServiceError::validation(
                "address_space.namespace_uri cannot be empty",
            ));
        }

        Ok(())
    }
}

impl GatewayConfig {
    /// Apply `MODBUS_HOST`, `MODBUS_PORT`, `OPCUA_HOST` and `OPCUA_PORT`
    /// as returned by `lookup`, then resolve the endpoints.
    ///
    /// A value that does not parse is a validation error.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> plcgate_framework::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = env_override_with::<String, _>("MODBUS_HOST", &lookup)? {
            self.modbus.host = host;
        }
        if let Some(port) = env_override_with::<u16, _>("MODBUS_PORT", &lookup)? {
            self.modbus.port = port;
        }
        if let Some(host) = env_override_with::<String, _>("OPCUA_HOST", &lookup)? {
            self.address_space.host = host;
        }
        if let Some(port) = env_override_with::<u16, _>("OPCUA_PORT", &lookup)? {
            self.address_space.port = port;
        }

        self.resolve_endpoints();
        Ok(())
    }

    /// Make sure the Zenoh session listens on the address-space endpoint.
    pub fn resolve_endpoints(&mut self) {
        let endpoint = self.address_space.endpoint();
        self.zenoh.add_listen(endpoint);
    }
}
