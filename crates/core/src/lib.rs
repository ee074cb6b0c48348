//! quorum-core
//!
//! Core library for auditing on-chain governance proposals before a vote.
//!
//! This crate defines the data model (source units, address records), the
//! address cache, the individual proposal checks, and the collaborators they
//! rely on (block explorer, address registries, forge, git). The pipeline
//! wires them together in a fixed order.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends.

pub mod cache;
pub mod model;
pub mod project;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
