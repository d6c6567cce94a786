//! Fake host for deterministic testing.
//!
//! Scripted responses for every `HostRuntime` call, no processes spawned.
//! Every call is recorded so tests can assert on tier order.
//!
//! ```rust,ignore
//! let host = FakeHostBuilder::new()
//!     .container(101, "web")
//!     .zfs_rootfs(101, "local-zfs", "rpool/data", "subvol-101-disk-0")
//!     .marker(101, "/etc/debian_version")
//!     .build();
//! ```

use crate::runtime::{ExecOutput, HostRuntime, SnapshotAttempt};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use steward_common::parsers::StoragePool;
use steward_common::{ContainerHandle, PowerState, StorageRef};

/// Scripted structured task API behaviour
#[derive(Debug, Clone)]
pub enum FakeTaskApi {
    Missing,
    Fails(String),
    Returns(String),
}

pub struct FakeHost {
    containers: Vec<ContainerHandle>,
    list_error: Option<String>,
    rootfs: HashMap<u32, StorageRef>,
    rootfs_errors: HashSet<u32>,
    pools: HashMap<String, StoragePool>,
    zfs_datasets: HashSet<String>,
    lvs: HashSet<String>,
    existing_snapshots: HashSet<String>,
    failing_zfs: HashSet<String>,
    failing_lvs: HashSet<String>,
    failing_ct_snapshots: HashSet<u32>,
    markers: HashMap<u32, HashSet<String>>,
    exec_errors: HashSet<u32>,
    update_exit: HashMap<u32, i32>,
    task_api: FakeTaskApi,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeHost {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls starting with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl HostRuntime for FakeHost {
    async fn list_containers(&self) -> Result<Vec<ContainerHandle>> {
        self.record("list_containers".to_string());
        if let Some(err) = &self.list_error {
            anyhow::bail!("{}", err);
        }
        Ok(self.containers.clone())
    }

    async fn container_rootfs(&self, vmid: u32) -> Result<Option<StorageRef>> {
        self.record(format!("container_rootfs {}", vmid));
        if self.rootfs_errors.contains(&vmid) {
            anyhow::bail!("pct config {} failed", vmid);
        }
        Ok(self.rootfs.get(&vmid).cloned())
    }

    async fn storage_pool(&self, name: &str) -> Result<Option<StoragePool>> {
        self.record(format!("storage_pool {}", name));
        Ok(self.pools.get(name).cloned())
    }

    async fn zfs_dataset_exists(&self, dataset: &str) -> bool {
        self.record(format!("zfs_dataset_exists {}", dataset));
        self.zfs_datasets.contains(dataset)
    }

    async fn zfs_snapshot(&self, target: &str) -> Result<SnapshotAttempt> {
        self.record(format!("zfs_snapshot {}", target));
        let dataset = target.split('@').next().unwrap_or(target);
        if self.failing_zfs.contains(dataset) {
            anyhow::bail!("zfs snapshot failed: out of space");
        }
        if self.existing_snapshots.contains(target) {
            return Ok(SnapshotAttempt::AlreadyExists);
        }
        Ok(SnapshotAttempt::Created)
    }

    async fn lv_exists(&self, lv_path: &str) -> bool {
        self.record(format!("lv_exists {}", lv_path));
        self.lvs.contains(lv_path)
    }

    async fn lv_snapshot(&self, lv_path: &str, snapshot_lv: &str, size: &str) -> Result<SnapshotAttempt> {
        self.record(format!("lv_snapshot {} {} {}", lv_path, snapshot_lv, size));
        if self.failing_lvs.contains(lv_path) {
            anyhow::bail!("lvcreate failed: insufficient free space");
        }
        if self.existing_snapshots.contains(snapshot_lv) {
            return Ok(SnapshotAttempt::AlreadyExists);
        }
        Ok(SnapshotAttempt::Created)
    }

    async fn container_snapshot(&self, vmid: u32, name: &str, _description: &str) -> Result<SnapshotAttempt> {
        self.record(format!("container_snapshot {} {}", vmid, name));
        if self.failing_ct_snapshots.contains(&vmid) {
            anyhow::bail!("snapshot feature is not available");
        }
        if self.existing_snapshots.contains(&format!("{}:{}", vmid, name)) {
            return Ok(SnapshotAttempt::AlreadyExists);
        }
        Ok(SnapshotAttempt::Created)
    }

    async fn exec(&self, vmid: u32, argv: &[String]) -> Result<ExecOutput> {
        self.record(format!("exec {} {}", vmid, argv.join(" ")));
        if self.exec_errors.contains(&vmid) {
            anyhow::bail!("pct exec {} failed: container not reachable", vmid);
        }

        // Marker probes are `test -e <path>`; anything else is an update.
        if argv.len() == 3 && argv[0] == "test" && argv[1] == "-e" {
            let present = self
                .markers
                .get(&vmid)
                .map(|m| m.contains(&argv[2]))
                .unwrap_or(false);
            return Ok(ExecOutput::exit(if present { 0 } else { 1 }));
        }

        let status = self.update_exit.get(&vmid).copied().unwrap_or(0);
        let mut output = ExecOutput::exit(status);
        if status != 0 {
            output.stderr = format!("E: update failed with exit code {}\n", status);
        }
        Ok(output)
    }

    async fn task_api_available(&self) -> bool {
        self.record("task_api_available".to_string());
        !matches!(self.task_api, FakeTaskApi::Missing)
    }

    async fn query_tasks(&self, node: &str, type_filter: &str, since: i64) -> Result<String> {
        self.record(format!("query_tasks {} {} {}", node, type_filter, since));
        match &self.task_api {
            FakeTaskApi::Missing => anyhow::bail!("pvesh: command not found"),
            FakeTaskApi::Fails(err) => anyhow::bail!("{}", err),
            FakeTaskApi::Returns(json) => Ok(json.clone()),
        }
    }
}

/// Builder for FakeHost with convenient test setup
pub struct FakeHostBuilder {
    host: FakeHost,
}

impl FakeHostBuilder {
    pub fn new() -> Self {
        Self {
            host: FakeHost {
                containers: Vec::new(),
                list_error: None,
                rootfs: HashMap::new(),
                rootfs_errors: HashSet::new(),
                pools: HashMap::new(),
                zfs_datasets: HashSet::new(),
                lvs: HashSet::new(),
                existing_snapshots: HashSet::new(),
                failing_zfs: HashSet::new(),
                failing_lvs: HashSet::new(),
                failing_ct_snapshots: HashSet::new(),
                markers: HashMap::new(),
                exec_errors: HashSet::new(),
                update_exit: HashMap::new(),
                task_api: FakeTaskApi::Missing,
                calls: Arc::new(Mutex::new(Vec::new())),
            },
        }
    }

    /// Add a running container
    pub fn container(self, vmid: u32, name: &str) -> Self {
        self.container_in_state(vmid, name, PowerState::Running)
    }

    pub fn container_in_state(mut self, vmid: u32, name: &str, state: PowerState) -> Self {
        self.host.containers.push(ContainerHandle::new(vmid, name, state));
        self
    }

    pub fn list_error(mut self, err: &str) -> Self {
        self.host.list_error = Some(err.to_string());
        self
    }

    pub fn rootfs(mut self, vmid: u32, storage: &str, volume: &str) -> Self {
        self.host.rootfs.insert(
            vmid,
            StorageRef {
                storage: storage.to_string(),
                volume: volume.to_string(),
            },
        );
        self
    }

    pub fn rootfs_error(mut self, vmid: u32) -> Self {
        self.host.rootfs_errors.insert(vmid);
        self
    }

    /// Register a storage pool with `key value` properties
    pub fn pool(mut self, name: &str, pool_type: &str, properties: &[(&str, &str)]) -> Self {
        let properties: BTreeMap<String, String> = properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.host.pools.insert(
            name.to_string(),
            StoragePool {
                name: name.to_string(),
                pool_type: pool_type.to_string(),
                properties,
            },
        );
        self
    }

    /// Container on a zfspool storage whose dataset exists
    pub fn zfs_rootfs(self, vmid: u32, storage: &str, pool: &str, volume: &str) -> Self {
        let dataset = format!("{}/{}", pool, volume);
        self.rootfs(vmid, storage, volume)
            .pool(storage, "zfspool", &[("pool", pool)])
            .zfs_dataset(&dataset)
    }

    /// Container on an lvm storage whose logical volume exists
    pub fn lvm_rootfs(self, vmid: u32, storage: &str, vg: &str, volume: &str) -> Self {
        let lv_path = format!("/dev/{}/{}", vg, volume);
        self.rootfs(vmid, storage, volume)
            .pool(storage, "lvm", &[("vgname", vg)])
            .lv(&lv_path)
    }

    /// Container on a directory storage
    pub fn dir_rootfs(self, vmid: u32, storage: &str, volume: &str) -> Self {
        self.rootfs(vmid, storage, volume)
            .pool(storage, "dir", &[("path", "/var/lib/vz")])
    }

    pub fn zfs_dataset(mut self, dataset: &str) -> Self {
        self.host.zfs_datasets.insert(dataset.to_string());
        self
    }

    pub fn lv(mut self, lv_path: &str) -> Self {
        self.host.lvs.insert(lv_path.to_string());
        self
    }

    /// Snapshot already present: a zfs target, an LV name, or `<vmid>:<name>`
    pub fn existing_snapshot(mut self, name: &str) -> Self {
        self.host.existing_snapshots.insert(name.to_string());
        self
    }

    pub fn failing_zfs_snapshot(mut self, dataset: &str) -> Self {
        self.host.failing_zfs.insert(dataset.to_string());
        self
    }

    pub fn failing_lv_snapshot(mut self, lv_path: &str) -> Self {
        self.host.failing_lvs.insert(lv_path.to_string());
        self
    }

    pub fn failing_container_snapshot(mut self, vmid: u32) -> Self {
        self.host.failing_ct_snapshots.insert(vmid);
        self
    }

    /// Marker file present inside the container
    pub fn marker(mut self, vmid: u32, path: &str) -> Self {
        self.host
            .markers
            .entry(vmid)
            .or_default()
            .insert(path.to_string());
        self
    }

    /// Every exec into this container errors
    pub fn exec_error(mut self, vmid: u32) -> Self {
        self.host.exec_errors.insert(vmid);
        self
    }

    /// Exit status of the update command (default 0)
    pub fn update_exit(mut self, vmid: u32, status: i32) -> Self {
        self.host.update_exit.insert(vmid, status);
        self
    }

    pub fn task_api(mut self, api: FakeTaskApi) -> Self {
        self.host.task_api = api;
        self
    }

    pub fn build(self) -> FakeHost {
        self.host
    }
}

impl Default for FakeHostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
