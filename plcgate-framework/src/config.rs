//! Configuration trait for plcgate services.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{ServiceError, Result};
use plcgate_common::{LoggingConfig, ZenohConfig};

/// Trait for service configuration types.
///
/// Loading runs in three steps: parse the JSON5 file, apply environment
/// overrides ([`apply_env`](Self::apply_env)), then
/// [`validate`](Self::validate).
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use plcgate_framework::{ServiceConfig, ZenohConfig, LoggingConfig};
///
/// #[derive(Debug, Default, Deserialize)]
/// pub struct MyConfig {
///     #[serde(default)]
///     pub zenoh: ZenohConfig,
///     #[serde(default)]
///     pub logging: LoggingConfig,
/// }
///
/// impl ServiceConfig for MyConfig {
///     fn zenoh(&self) -> &ZenohConfig { &self.zenoh }
///     fn logging(&self) -> &LoggingConfig { &self.logging }
///     fn key_prefix(&self) -> &str { "my/prefix" }
/// }
/// ```
pub trait ServiceConfig: Sized + DeserializeOwned {
    /// Get the Zenoh configuration.
    fn zenoh(&self) -> &ZenohConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Key expression prefix under which the service publishes.
    fn key_prefix(&self) -> &str;

    /// Apply environment variable overrides.
    fn apply_env(&mut self) -> Result<()> {
        Ok(())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from a file path. The file must exist.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ServiceError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Self = json5::from_str(&content)?;

        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file path, falling back to defaults when the
    /// file does not exist. Environment overrides apply either way.
    fn load_or_default(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Default,
    {
        let path = path.as_ref();

        if path.exists() {
            return Self::load(path);
        }

        tracing::debug!(path = %path.display(), "Config file not found, using defaults");

        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }
}
