//! stewardctl - fleet update and backup audit for a Proxmox VE host

pub mod backup;
pub mod commands;
pub mod executor;
pub mod exit_codes;
pub mod fake;
pub mod orchestrator;
pub mod prober;
pub mod pve;
pub mod report_display;
pub mod resolver;
pub mod runtime;
pub mod snapshotter;

pub use backup::BackupAuditor;
pub use fake::{FakeHost, FakeHostBuilder};
pub use orchestrator::FleetOrchestrator;
pub use pve::PveHost;
pub use runtime::HostRuntime;
