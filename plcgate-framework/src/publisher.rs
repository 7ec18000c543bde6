//! Serialized publishing on a Zenoh session.

use std::sync::Arc;

use serde::Serialize;
use plcgate_common::{Format, encode};

use crate::error::{ServiceError, Result};

/// Publisher for sending serialized values to Zenoh.
///
/// Cheap to clone; all clones share the same session.
#[derive(Clone, Debug)]
pub struct Publisher {
    session: Arc<zenoh::Session>,
    format: Format,
}

impl Publisher {
    pub fn new(session: Arc<zenoh::Session>, format: Format) -> Self {
        Self { session, format }
    }

    /// Get the serialization format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Get a reference to the Zenoh session.
    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Encode `value` with the publisher's format.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        encode(value, self.format).map_err(|e| ServiceError::Serialization(e.to_string()))
    }

    /// Publish `value` on `key` using the publisher's format.
    pub async fn publish<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = self.encode(value)?;
        self.publish_raw(key, payload).await
    }

    /// Publish raw bytes to a key.
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| ServiceError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// Publish a value as JSON regardless of the configured format.
    pub async fn publish_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(key, payload).await
    }
}
