//! Modbus TCP to hierarchical address space gateway.
//!
//! The gateway reads a nine-register sensor image from a Modbus device on a
//! fixed interval and exposes the decoded values as typed variable nodes.
//!
//! # Key Expressions
//!
//! ```text
//! plcgate/opcua/<object>/<variable>   node samples (put + queryable)
//! plcgate/opcua/@/browse              node descriptions
//! plcgate/opcua/@/status              service status
//! ```
//!
//! The prefix and object name come from the configuration; the variables are
//! `Temperature`, `Humidity`, `Pressure`, `Vibration` and `Production`.

pub mod address_space;
pub mod codec;
pub mod config;
pub mod link;
pub mod server;
pub mod service;
pub mod simulator;
pub mod sync;
