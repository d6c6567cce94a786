//! Parser for the storage pool registry (`/etc/pve/storage.cfg`).
//!
//! Sections start with an unindented `<type>: <name>` header followed by
//! indented `key value` properties. Flags without a value map to "".

use crate::fleet::BackendKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePool {
    pub name: String,
    pub pool_type: String,
    pub properties: BTreeMap<String, String>,
}

impl StoragePool {
    pub fn backend_kind(&self) -> BackendKind {
        BackendKind::from_storage_type(&self.pool_type)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Parent dataset for zfspool storages
    pub fn zfs_pool(&self) -> Option<&str> {
        self.property("pool")
    }

    /// Volume group for lvm / lvmthin storages
    pub fn vgname(&self) -> Option<&str> {
        self.property("vgname")
    }
}

pub fn parse_storage_cfg(content: &str) -> Vec<StoragePool> {
    let mut pools: Vec<StoragePool> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let indented = line.starts_with(' ') || line.starts_with('\t');
        if !indented {
            if let Some((pool_type, name)) = line.split_once(':') {
                pools.push(StoragePool {
                    name: name.trim().to_string(),
                    pool_type: pool_type.trim().to_string(),
                    properties: BTreeMap::new(),
                });
            }
            continue;
        }

        if let Some(current) = pools.last_mut() {
            let trimmed = line.trim();
            let (key, value) = trimmed.split_once(char::is_whitespace).unwrap_or((trimmed, ""));
            current
                .properties
                .insert(key.to_string(), value.trim().to_string());
        }
    }

    pools
}
