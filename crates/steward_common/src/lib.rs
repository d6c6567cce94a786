//! pve-steward common - shared types, config and parsers
//!
//! Fleet update model (containers, storage, snapshots, OS classes), backup
//! audit model, and pure parsers for `pct`, `storage.cfg` and task logs.

pub mod backup;
pub mod config;
pub mod error;
pub mod fleet;
pub mod parsers;

pub use backup::*;
pub use config::StewardConfig;
pub use error::{StewardError, UpidError};
pub use fleet::*;
