//! Working-directory configuration.
//!
//! - `QuorumSettings`: environment-derived settings (main path, API keys).
//! - `QuorumLayout`: computed paths under the main path.
//! - `GroundTruth` / `CustomerConfig`: per-customer repositories and providers.
//! - `BatchConfig`: proposals to check in one `validate-batch` run.
//! - `QuorumContext`: settings + layout + opened address cache.

pub mod config;
pub mod context;
pub mod layout;
pub mod settings;

pub use config::*;
pub use context::*;
pub use layout::*;
pub use settings::*;
