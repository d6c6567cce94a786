//! Parsers for `pct list` and `pct config` output.

use crate::fleet::{ContainerHandle, PowerState, StorageRef};

/// Parse `pct list` output.
///
/// Columns are `VMID Status [Lock] Name`; the lock column is blank for most
/// containers, so the name is always taken from the last column. Rows whose
/// first column is not a numeric ID (the header) are ignored.
pub fn parse_pct_list(output: &str) -> Vec<ContainerHandle> {
    let mut containers = Vec::new();

    for line in output.lines() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 2 {
            continue;
        }
        let vmid = match cols[0].parse::<u32>() {
            Ok(id) => id,
            Err(_) => continue,
        };
        let state = PowerState::from_string(cols[1]);
        let name = if cols.len() >= 3 { cols[cols.len() - 1] } else { "" };

        containers.push(ContainerHandle::new(vmid, name, state));
    }

    containers
}

/// Extract the root storage reference from `pct config <vmid>` output.
pub fn parse_rootfs(config: &str) -> Option<StorageRef> {
    config
        .lines()
        .find_map(|line| line.trim().strip_prefix("rootfs:"))
        .and_then(parse_storage_ref)
}

/// Parse `<storage>:<volume>[,key=value...]`.
///
/// Bind-mounted roots (absolute paths) carry no storage name and yield None.
pub fn parse_storage_ref(value: &str) -> Option<StorageRef> {
    let volume_spec = value.trim().split(',').next()?;
    let (storage, volume) = volume_spec.split_once(':')?;
    if storage.is_empty() || volume.is_empty() || storage.starts_with('/') {
        return None;
    }

    Some(StorageRef {
        storage: storage.to_string(),
        volume: volume.to_string(),
    })
}
