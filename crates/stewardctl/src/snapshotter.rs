//! Snapshot Acquirer - take a pre-update rollback point per container
//!
//! Tiers, strictly in order: ZFS dataset snapshot, LVM copy-on-write
//! snapshot, container-level snapshot. A failing tier falls through to the
//! next one. If the last tier fails too the record is `skipped` and the update
//! still goes ahead.

use crate::runtime::HostRuntime;
use steward_common::config::StorageConfig;
use steward_common::{SnapshotBackend, SnapshotName, SnapshotRecord, StorageDescriptor};
use tracing::{info, warn};

pub struct Snapshotter<'a> {
    host: &'a dyn HostRuntime,
    lvm_snapshot_size: String,
}

impl<'a> Snapshotter<'a> {
    pub fn new(host: &'a dyn HostRuntime, config: &StorageConfig) -> Self {
        Self {
            host,
            lvm_snapshot_size: config.lvm_snapshot_size.clone(),
        }
    }

    /// Produce exactly one record for this container. Never fails.
    pub async fn acquire(&self, descriptor: &StorageDescriptor, name: &SnapshotName) -> SnapshotRecord {
        let vmid = descriptor.vmid;
        let mut notes: Vec<String> = Vec::new();

        if let Some(dataset) = descriptor.zfs_dataset() {
            let target = name.zfs_target(dataset);
            info!("Creating ZFS snapshot {}", target);
            match self.host.zfs_snapshot(&target).await {
                Ok(attempt) => {
                    return SnapshotRecord::created(vmid, SnapshotBackend::Zfs, name.as_str(), attempt.is_reused());
                }
                Err(e) => {
                    warn!("ZFS snapshot of {} failed, falling back: {:#}", dataset, e);
                    notes.push(format!("zfs: {:#}", e));
                }
            }
        }

        if let Some(lv_path) = descriptor.lv_path() {
            let snapshot_lv = name.lv_name(lv_path);
            info!("Creating LVM snapshot {} of {} ({})", snapshot_lv, lv_path, self.lvm_snapshot_size);
            match self
                .host
                .lv_snapshot(lv_path, &snapshot_lv, &self.lvm_snapshot_size)
                .await
            {
                Ok(attempt) => {
                    return SnapshotRecord::created(vmid, SnapshotBackend::Lvm, name.as_str(), attempt.is_reused());
                }
                Err(e) => {
                    warn!("LVM snapshot of {} failed, falling back: {:#}", lv_path, e);
                    notes.push(format!("lvm: {:#}", e));
                }
            }
        }

        let ct_name = name.container_name();
        info!("Creating container snapshot {} for {}", ct_name, vmid);
        match self
            .host
            .container_snapshot(vmid, &ct_name, &name.description())
            .await
        {
            Ok(attempt) => {
                let mut record =
                    SnapshotRecord::created(vmid, SnapshotBackend::Generic, &ct_name, attempt.is_reused());
                if !notes.is_empty() {
                    record.detail = Some(notes.join("; "));
                }
                record
            }
            Err(e) => {
                notes.push(format!("container: {:#}", e));
                warn!(
                    "No rollback point for container {}, updating anyway: {:#}",
                    vmid, e
                );
                SnapshotRecord::skipped(vmid, &ct_name, &notes.join("; "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeHostBuilder;
    use crate::resolver::resolve_container;
    use chrono::NaiveDate;
    use steward_common::SnapshotOutcome;

    fn name() -> SnapshotName {
        SnapshotName::for_date("pre_update", NaiveDate::from_ymd_opt(2026, 10, 16).unwrap())
    }

    #[tokio::test]
    async fn test_zfs_tier_first() {
        let host = FakeHostBuilder::new()
            .zfs_rootfs(101, "local-zfs", "rpool/data", "subvol-101-disk-0")
            .build();
        let desc = resolve_container(&host, 101).await;
        let record = Snapshotter::new(&host, &StorageConfig::default()).acquire(&desc, &name()).await;

        assert_eq!(record.outcome, SnapshotOutcome::Created);
        assert_eq!(record.backend, SnapshotBackend::Zfs);
        assert_eq!(record.name, "pre_update_2026-10-16");
        assert!(host.calls_matching("lv_snapshot").is_empty());
        assert!(host.calls_matching("container_snapshot").is_empty());
    }

    #[tokio::test]
    async fn test_zfs_failure_falls_to_container_snapshot() {
        let host = FakeHostBuilder::new()
            .zfs_rootfs(101, "local-zfs", "rpool/data", "subvol-101-disk-0")
            .failing_zfs_snapshot("rpool/data/subvol-101-disk-0")
            .build();
        let desc = resolve_container(&host, 101).await;
        let record = Snapshotter::new(&host, &StorageConfig::default()).acquire(&desc, &name()).await;

        assert_eq!(record.backend, SnapshotBackend::Generic);
        assert!(record.is_created());
        assert_eq!(record.name, "pre_update_2026_10_16");
        assert!(record.detail.unwrap().starts_with("zfs:"));
        assert_eq!(host.calls_matching("container_snapshot"), vec!["container_snapshot 101 pre_update_2026_10_16"]);
    }

    #[tokio::test]
    async fn test_lvm_uses_configured_size() {
        let host = FakeHostBuilder::new()
            .lvm_rootfs(102, "big-lvm", "bigvg", "vm-102-disk-0")
            .build();
        let desc = resolve_container(&host, 102).await;
        let config = StorageConfig {
            lvm_snapshot_size: "2G".to_string(),
            ..Default::default()
        };
        let record = Snapshotter::new(&host, &config).acquire(&desc, &name()).await;

        assert_eq!(record.backend, SnapshotBackend::Lvm);
        assert_eq!(
            host.calls_matching("lv_snapshot"),
            vec!["lv_snapshot /dev/bigvg/vm-102-disk-0 vm-102-disk-0_pre_update_2026-10-16 2G"]
        );
    }

    #[tokio::test]
    async fn test_all_tiers_fail_is_skipped() {
        let host = FakeHostBuilder::new()
            .lvm_rootfs(102, "big-lvm", "bigvg", "vm-102-disk-0")
            .failing_lv_snapshot("/dev/bigvg/vm-102-disk-0")
            .failing_container_snapshot(102)
            .build();
        let desc = resolve_container(&host, 102).await;
        let record = Snapshotter::new(&host, &StorageConfig::default()).acquire(&desc, &name()).await;

        assert_eq!(record.outcome, SnapshotOutcome::Skipped);
        assert_eq!(record.name, "pre_update_2026_10_16");
        let detail = record.detail.unwrap();
        assert!(detail.contains("lvm:"));
        assert!(detail.contains("container:"));
    }

    #[tokio::test]
    async fn test_existing_snapshot_is_reused() {
        let host = FakeHostBuilder::new()
            .zfs_rootfs(101, "local-zfs", "rpool/data", "subvol-101-disk-0")
            .existing_snapshot("rpool/data/subvol-101-disk-0@pre_update_2026-10-16")
            .build();
        let desc = resolve_container(&host, 101).await;
        let record = Snapshotter::new(&host, &StorageConfig::default()).acquire(&desc, &name()).await;

        assert!(record.is_created());
        assert!(record.reused);
    }

    #[tokio::test]
    async fn test_generic_tier_records_container_identifier() {
        let host = FakeHostBuilder::new()
            .dir_rootfs(105, "local", "105/vm-105-disk-0.raw")
            .build();
        let desc = resolve_container(&host, 105).await;
        let record = Snapshotter::new(&host, &StorageConfig::default()).acquire(&desc, &name()).await;

        assert_eq!(record.backend, SnapshotBackend::Generic);
        assert_eq!(record.name, "pre_update_2026_10_16");
        assert!(record.detail.is_none());
        assert_eq!(
            host.calls_matching("container_snapshot"),
            vec![format!("container_snapshot 105 {}", record.name)]
        );
    }
}
