//! Error types for the service framework.

use thiserror::Error;

/// Result type alias using [`ServiceError`].
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors that can stop a service from starting or shutting down cleanly.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Zenoh session could not be opened or used.
    #[error("Zenoh session error: {0}")]
    ZenohSession(String),

    /// Payload serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Publishing error.
    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },

    /// A component failed to initialize.
    #[error("Startup of {component} failed: {message}")]
    Startup { component: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a startup error for a named component.
    pub fn startup(component: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Startup {
            component: component.into(),
            message: msg.into(),
        }
    }
}

impl From<zenoh::Error> for ServiceError {
    fn from(err: zenoh::Error) -> Self {
        Self::ZenohSession(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for ServiceError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<plcgate_common::Error> for ServiceError {
    fn from(err: plcgate_common::Error) -> Self {
        match err {
            plcgate_common::Error::Config(msg) => Self::Config(msg),
            plcgate_common::Error::EnvOverride { .. } => Self::ConfigValidation(err.to_string()),
            plcgate_common::Error::Zenoh(e) => Self::ZenohSession(e.to_string()),
            plcgate_common::Error::Io(e) => Self::Io(e),
            other => Self::Serialization(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override_maps_to_validation() {
        let err = plcgate_common::Error::EnvOverride {
            name: "MODBUS_PORT".to_string(),
            value: "abc".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        let mapped = ServiceError::from(err);
        assert!(matches!(mapped, ServiceError::ConfigValidation(_)));
        assert!(mapped.to_string().contains("MODBUS_PORT"));
    }

    #[test]
    fn test_startup_message() {
        let err = ServiceError::startup("node server", "queryable refused");
        assert_eq!(
            err.to_string(),
            "Startup of node server failed: queryable refused"
        );
    }
}
