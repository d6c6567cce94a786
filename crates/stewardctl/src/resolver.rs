//! Storage backend resolution.
//!
//! Total: every failure along the way degrades the descriptor to `generic`
//! instead of surfacing an error. The snapshot fallback chain absorbs the rest.

use crate::runtime::HostRuntime;
use steward_common::{BackendKind, StorageDescriptor, StorageRef};
use tracing::{debug, info, warn};

/// Resolve a container's root storage, starting from its config.
pub async fn resolve_container(host: &dyn HostRuntime, vmid: u32) -> StorageDescriptor {
    match host.container_rootfs(vmid).await {
        Ok(Some(storage_ref)) => resolve(host, vmid, storage_ref).await,
        Ok(None) => {
            info!("Container {} has no storage-backed rootfs, using generic", vmid);
            StorageDescriptor::generic(vmid, None)
        }
        Err(e) => {
            warn!("Could not read rootfs of container {}: {:#}", vmid, e);
            StorageDescriptor::generic(vmid, None)
        }
    }
}

/// Resolve a `<storage>:<volume>` reference to a backend and verified path.
pub async fn resolve(host: &dyn HostRuntime, vmid: u32, storage_ref: StorageRef) -> StorageDescriptor {
    let pool = match host.storage_pool(&storage_ref.storage).await {
        Ok(Some(pool)) => pool,
        Ok(None) => {
            warn!("Storage '{}' not found in pool registry", storage_ref.storage);
            return StorageDescriptor::generic(vmid, Some(storage_ref));
        }
        Err(e) => {
            warn!("Storage pool registry unavailable: {:#}", e);
            return StorageDescriptor::generic(vmid, Some(storage_ref));
        }
    };

    let kind = pool.backend_kind();
    debug!("Storage '{}' is type {} ({})", pool.name, pool.pool_type, kind);

    match kind {
        BackendKind::Zfs => {
            let Some(parent) = pool.zfs_pool() else {
                warn!("zfspool '{}' has no pool property", pool.name);
                return StorageDescriptor::generic(vmid, Some(storage_ref));
            };
            let dataset = format!("{}/{}", parent, storage_ref.volume);
            let descriptor = StorageDescriptor::with_path(vmid, storage_ref, kind, dataset.clone());

            if host.zfs_dataset_exists(&dataset).await {
                descriptor
            } else {
                warn!("Dataset {} not listed by zfs, degrading to generic", dataset);
                descriptor.degrade()
            }
        }
        BackendKind::Lvm | BackendKind::LvmThin => {
            let Some(vg) = pool.vgname() else {
                warn!("{} storage '{}' has no vgname", pool.pool_type, pool.name);
                return StorageDescriptor::generic(vmid, Some(storage_ref));
            };
            let lv_path = format!("/dev/{}/{}", vg, storage_ref.volume);
            let descriptor = StorageDescriptor::with_path(vmid, storage_ref, kind, lv_path.clone());

            if host.lv_exists(&lv_path).await {
                descriptor
            } else {
                warn!("Logical volume {} not displayable, degrading to generic", lv_path);
                descriptor.degrade()
            }
        }
        BackendKind::Generic => StorageDescriptor::generic(vmid, Some(storage_ref)),
    }
}
