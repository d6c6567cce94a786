//! Fleet update data model: containers, storage, snapshots, OS classes and
//! the per-run report.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Power state as reported by the container registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Running,
    Stopped,
    Unknown,
}

impl PowerState {
    pub fn from_string(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "running" => PowerState::Running,
            "stopped" => PowerState::Stopped,
            _ => PowerState::Unknown,
        }
    }
}

/// A container as seen at discovery time. Never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub vmid: u32,
    pub name: String,
    pub state: PowerState,
}

impl ContainerHandle {
    pub fn new(vmid: u32, name: &str, state: PowerState) -> Self {
        Self {
            vmid,
            name: name.to_string(),
            state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == PowerState::Running
    }
}

/// Storage backend family of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "zfs")]
    Zfs,
    #[serde(rename = "lvm")]
    Lvm,
    #[serde(rename = "lvm-thin")]
    LvmThin,
    #[serde(rename = "generic")]
    Generic,
}

impl BackendKind {
    /// Map a storage.cfg pool type to its backend family.
    pub fn from_storage_type(pool_type: &str) -> Self {
        match pool_type.trim() {
            "zfspool" => BackendKind::Zfs,
            "lvm" => BackendKind::Lvm,
            "lvmthin" => BackendKind::LvmThin,
            _ => BackendKind::Generic,
        }
    }

    pub fn is_zfs_family(&self) -> bool {
        matches!(self, BackendKind::Zfs)
    }

    pub fn is_lvm_family(&self) -> bool {
        matches!(self, BackendKind::Lvm | BackendKind::LvmThin)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendKind::Zfs => "zfs",
            BackendKind::Lvm => "lvm",
            BackendKind::LvmThin => "lvm-thin",
            BackendKind::Generic => "generic",
        };
        write!(f, "{}", s)
    }
}

/// `<storage-name>:<volume-spec>` pair from a container's rootfs line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRef {
    pub storage: String,
    pub volume: String,
}

impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.storage, self.volume)
    }
}

/// Resolved storage for one container. Computed once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    pub vmid: u32,
    pub storage_ref: Option<StorageRef>,
    pub kind: BackendKind,
    /// Dataset name (zfs) or logical volume path (lvm family)
    pub path: Option<String>,
}

impl StorageDescriptor {
    pub fn generic(vmid: u32, storage_ref: Option<StorageRef>) -> Self {
        Self {
            vmid,
            storage_ref,
            kind: BackendKind::Generic,
            path: None,
        }
    }

    pub fn with_path(vmid: u32, storage_ref: StorageRef, kind: BackendKind, path: String) -> Self {
        Self {
            vmid,
            storage_ref: Some(storage_ref),
            kind,
            path: Some(path),
        }
    }

    /// Same reference, no usable backend path.
    pub fn degrade(self) -> Self {
        Self::generic(self.vmid, self.storage_ref)
    }

    /// Dataset name when this is a verified ZFS descriptor.
    pub fn zfs_dataset(&self) -> Option<&str> {
        if self.kind.is_zfs_family() {
            self.path.as_deref()
        } else {
            None
        }
    }

    /// Logical volume path when this is a verified LVM descriptor.
    pub fn lv_path(&self) -> Option<&str> {
        if self.kind.is_lvm_family() {
            self.path.as_deref()
        } else {
            None
        }
    }
}

/// Deterministic snapshot name, `<prefix>_<YYYY-MM-DD>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotName {
    name: String,
    date: NaiveDate,
}

impl SnapshotName {
    pub fn for_date(prefix: &str, date: NaiveDate) -> Self {
        Self {
            name: format!("{}_{}", prefix, date.format("%Y-%m-%d")),
            date,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// `<dataset>@<name>`
    pub fn zfs_target(&self, dataset: &str) -> String {
        format!("{}@{}", dataset, self.name)
    }

    /// Snapshot LV name derived from the origin LV path.
    pub fn lv_name(&self, lv_path: &str) -> String {
        let origin = lv_path.rsplit('/').next().unwrap_or(lv_path);
        format!("{}_{}", origin, self.name)
    }

    /// Container snapshot identifiers only accept `[A-Za-z][A-Za-z0-9_]*`.
    pub fn container_name(&self) -> String {
        self.name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    pub fn description(&self) -> String {
        format!(
            "Automatic snapshot before fleet update on {}",
            self.date.format("%Y-%m-%d")
        )
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Mechanism a snapshot was taken with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotBackend {
    Zfs,
    Lvm,
    Generic,
}

impl fmt::Display for SnapshotBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotBackend::Zfs => "zfs",
            SnapshotBackend::Lvm => "lvm",
            SnapshotBackend::Generic => "generic",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOutcome {
    Created,
    Skipped,
}

/// Exactly one per container per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub vmid: u32,
    pub backend: SnapshotBackend,
    pub name: String,
    pub outcome: SnapshotOutcome,
    /// A same-day snapshot already existed and was kept
    #[serde(default)]
    pub reused: bool,
    /// Why lower tiers were used or the snapshot was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SnapshotRecord {
    pub fn created(vmid: u32, backend: SnapshotBackend, name: &str, reused: bool) -> Self {
        Self {
            vmid,
            backend,
            name: name.to_string(),
            outcome: SnapshotOutcome::Created,
            reused,
            detail: None,
        }
    }

    pub fn skipped(vmid: u32, name: &str, reason: &str) -> Self {
        Self {
            vmid,
            backend: SnapshotBackend::Generic,
            name: name.to_string(),
            outcome: SnapshotOutcome::Skipped,
            reused: false,
            detail: Some(reason.to_string()),
        }
    }

    pub fn is_created(&self) -> bool {
        self.outcome == SnapshotOutcome::Created
    }
}

/// Guest operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Debian,
    Alpine,
    Arch,
    Fedora,
    Unknown,
}

impl OsFamily {
    /// Marker files in probe order. First match wins.
    pub const MARKERS: [(OsFamily, &'static str); 4] = [
        (OsFamily::Debian, "/etc/debian_version"),
        (OsFamily::Alpine, "/etc/alpine-release"),
        (OsFamily::Arch, "/etc/arch-release"),
        (OsFamily::Fedora, "/etc/fedora-release"),
    ];

    pub fn is_known(&self) -> bool {
        *self != OsFamily::Unknown
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OsFamily::Debian => "debian",
            OsFamily::Alpine => "alpine",
            OsFamily::Arch => "arch",
            OsFamily::Fedora => "fedora",
            OsFamily::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    Success,
    Failure,
    SkippedUnknownOs,
}

/// Per-container pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStage {
    Discovered,
    Snapshotting,
    Classifying,
    Updating,
    SkippedUnknownOs,
    Reported,
}

impl fmt::Display for ContainerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerStage::Discovered => "discovered",
            ContainerStage::Snapshotting => "snapshotting",
            ContainerStage::Classifying => "classifying",
            ContainerStage::Updating => "updating",
            ContainerStage::SkippedUnknownOs => "skipped-unknown-os",
            ContainerStage::Reported => "reported",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one container's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerReport {
    pub vmid: u32,
    pub name: String,
    pub storage: BackendKind,
    pub snapshot: SnapshotRecord,
    pub os: OsFamily,
    pub outcome: UpdateOutcome,
    /// Stage the container was in when an error was captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<ContainerStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Aggregate result of one fleet run. Lives only for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: usize,
    pub failure: usize,
    pub skipped_unknown_os: usize,
    pub containers: Vec<ContainerReport>,
}

impl FleetReport {
    pub fn new(run_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at,
            finished_at: None,
            success: 0,
            failure: 0,
            skipped_unknown_os: 0,
            containers: Vec::new(),
        }
    }

    /// Fold one container into the counters.
    pub fn record(&mut self, report: ContainerReport) {
        match report.outcome {
            UpdateOutcome::Success => self.success += 1,
            UpdateOutcome::Failure => self.failure += 1,
            UpdateOutcome::SkippedUnknownOs => self.skipped_unknown_os += 1,
        }
        self.containers.push(report);
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    pub fn total(&self) -> usize {
        self.containers.len()
    }

    pub fn has_failures(&self) -> bool {
        self.failure > 0
    }

    pub fn container(&self, vmid: u32) -> Option<&ContainerReport> {
        self.containers.iter().find(|c| c.vmid == vmid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_snapshot_name_is_deterministic() {
        let name = SnapshotName::for_date("pre_update", date());
        assert_eq!(name.as_str(), "pre_update_2026-10-16");
        assert_eq!(name.zfs_target("rpool/data/subvol-101-disk-0"), "rpool/data/subvol-101-disk-0@pre_update_2026-10-16");
        assert_eq!(name.lv_name("/dev/pve/vm-102-disk-0"), "vm-102-disk-0_pre_update_2026-10-16");
        assert_eq!(name.container_name(), "pre_update_2026_10_16");
    }

    #[test]
    fn test_backend_kind_from_storage_type() {
        assert_eq!(BackendKind::from_storage_type("zfspool"), BackendKind::Zfs);
        assert_eq!(BackendKind::from_storage_type("lvmthin"), BackendKind::LvmThin);
        assert_eq!(BackendKind::from_storage_type("lvm"), BackendKind::Lvm);
        assert_eq!(BackendKind::from_storage_type("dir"), BackendKind::Generic);
        assert_eq!(BackendKind::from_storage_type("nfs"), BackendKind::Generic);
        assert!(BackendKind::LvmThin.is_lvm_family());
    }

    #[test]
    fn test_degrade_drops_path() {
        let sref = StorageRef {
            storage: "local-zfs".into(),
            volume: "subvol-101-disk-0".into(),
        };
        let desc = StorageDescriptor::with_path(101, sref.clone(), BackendKind::Zfs, "rpool/data/subvol-101-disk-0".into());
        assert_eq!(desc.zfs_dataset(), Some("rpool/data/subvol-101-disk-0"));
        let degraded = desc.degrade();
        assert_eq!(degraded.kind, BackendKind::Generic);
        assert_eq!(degraded.path, None);
        assert_eq!(degraded.storage_ref, Some(sref));
    }

    #[test]
    fn test_marker_order() {
        let order: Vec<OsFamily> = OsFamily::MARKERS.iter().map(|(os, _)| *os).collect();
        assert_eq!(order, vec![OsFamily::Debian, OsFamily::Alpine, OsFamily::Arch, OsFamily::Fedora]);
    }

    #[test]
    fn test_fleet_report_counters() {
        let mut report = FleetReport::new("run", Utc::now());
        let base = ContainerReport {
            vmid: 1,
            name: "a".into(),
            storage: BackendKind::Generic,
            snapshot: SnapshotRecord::skipped(1, "pre_update_2026-10-16", "unsupported"),
            os: OsFamily::Debian,
            outcome: UpdateOutcome::Success,
            failed_at: None,
            error: None,
            duration_ms: 0,
        };
        report.record(base.clone());
        report.record(ContainerReport { vmid: 2, outcome: UpdateOutcome::Failure, ..base.clone() });
        report.record(ContainerReport { vmid: 3, outcome: UpdateOutcome::SkippedUnknownOs, ..base });

        assert_eq!((report.success, report.failure, report.skipped_unknown_os), (1, 1, 1));
        assert!(report.has_failures());
        assert_eq!(report.total(), 3);
    }
}
