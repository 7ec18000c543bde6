//! plcgate Service Framework
//!
//! Lifecycle plumbing shared by the plcgate binaries.
//!
//! # Overview
//!
//! This framework provides:
//! - [`ServiceConfig`] trait for configuration loading, environment overrides and validation
//! - [`ServiceRunner`] for managing service lifecycle (startup, cancellation, shutdown)
//! - [`Publisher`] for publishing serialized values to Zenoh
//! - [`ServiceArgs`] for common CLI argument parsing
//! - [`ServiceStatus`] for standardized status reporting

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::ServiceArgs;
pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use publisher::Publisher;
pub use runner::ServiceRunner;
pub use status::{ServiceState, ServiceStatus, StatusPublisher};

// Re-export commonly used types from plcgate-common
pub use plcgate_common::{Format, LoggingConfig, ZenohConfig};
pub use tokio_util::sync::CancellationToken;
