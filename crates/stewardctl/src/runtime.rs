//! Host collaborator trait.
//!
//! Everything the fleet and audit code needs from the virtualization host
//! goes through `HostRuntime`. Production code uses `PveHost` which shells out
//! to the host tooling; tests use `FakeHost` with scripted responses.

use anyhow::Result;
use async_trait::async_trait;
use steward_common::parsers::StoragePool;
use steward_common::{ContainerHandle, StorageRef};

/// Result of a snapshot primitive that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotAttempt {
    Created,
    /// Same name already present; kept as is
    AlreadyExists,
}

impl SnapshotAttempt {
    pub fn is_reused(&self) -> bool {
        *self == SnapshotAttempt::AlreadyExists
    }
}

/// Exit status and captured output of a command run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// None when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn exit(status: i32) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Last non-empty stderr line, for log messages.
    pub fn stderr_tail(&self) -> Option<&str> {
        self.stderr.lines().rev().map(str::trim).find(|l| !l.is_empty())
    }
}

#[async_trait]
pub trait HostRuntime: Send + Sync {
    /// All containers with their power state.
    async fn list_containers(&self) -> Result<Vec<ContainerHandle>>;

    /// Root storage reference of a container, None for bind-mounted roots.
    async fn container_rootfs(&self, vmid: u32) -> Result<Option<StorageRef>>;

    /// Storage pool definition by name, None if not registered.
    async fn storage_pool(&self, name: &str) -> Result<Option<StoragePool>>;

    async fn zfs_dataset_exists(&self, dataset: &str) -> bool;

    /// Snapshot `<dataset>@<name>`.
    async fn zfs_snapshot(&self, target: &str) -> Result<SnapshotAttempt>;

    async fn lv_exists(&self, lv_path: &str) -> bool;

    /// Copy-on-write snapshot of `lv_path` named `snapshot_lv` with `size` reserved.
    async fn lv_snapshot(&self, lv_path: &str, snapshot_lv: &str, size: &str) -> Result<SnapshotAttempt>;

    /// Container-level snapshot through the virtualization layer.
    async fn container_snapshot(&self, vmid: u32, name: &str, description: &str) -> Result<SnapshotAttempt>;

    /// Run `argv` inside a running container.
    async fn exec(&self, vmid: u32, argv: &[String]) -> Result<ExecOutput>;

    /// Whether the structured task API can be queried on this host.
    async fn task_api_available(&self) -> bool;

    /// Raw JSON task list for `node` of type `type_filter` started at or after `since`.
    async fn query_tasks(&self, node: &str, type_filter: &str, since: i64) -> Result<String>;
}
