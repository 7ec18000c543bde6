//! Service status reporting.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::publisher::Publisher;

/// Lifecycle state reported on the status key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Starting,
    Running,
    Offline,
    Error,
}

/// Service status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Service name (e.g. "gateway").
    pub service: String,
    pub version: String,
    pub status: ServiceState,
    /// Additional service-specific metadata.
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl ServiceStatus {
    pub fn new(service: impl Into<String>, version: impl Into<String>, status: ServiceState) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            status,
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a status in the error state.
    pub fn error(
        service: impl Into<String>,
        version: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(service, version, ServiceState::Error)
            .with_metadata(serde_json::json!({ "error": error.into() }))
    }

    /// Add metadata to the status.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Publishes the service status to a fixed key.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    publisher: Publisher,
    key: String,
    service: String,
    version: String,
}

impl StatusPublisher {
    pub fn new(
        publisher: Publisher,
        key: impl Into<String>,
        service: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            key: key.into(),
            service: service.into(),
            version: version.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Publish a state with optional metadata.
    pub async fn publish(
        &self,
        state: ServiceState,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut status = ServiceStatus::new(&self.service, &self.version, state);
        if let Some(meta) = metadata {
            status = status.with_metadata(meta);
        }
        self.publisher.publish_json(&self.key, &status).await
    }

    /// Publish the error state.
    pub async fn publish_error(&self, error: impl Into<String>) -> Result<()> {
        let status = ServiceStatus::error(&self.service, &self.version, error);
        self.publisher.publish_json(&self.key, &status).await
    }
}
