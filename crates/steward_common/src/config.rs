//! Configuration for pve-steward.
//!
//! Loads settings from /etc/pve-steward/config.toml or uses defaults.

use crate::error::{Result, StewardError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/pve-steward/config.toml";

/// Storage registry and snapshot sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage pool registry
    #[serde(default = "default_storage_cfg_path")]
    pub storage_cfg_path: String,

    /// Copy-on-write reservation for LVM snapshots
    #[serde(default = "default_lvm_snapshot_size")]
    pub lvm_snapshot_size: String,
}

fn default_storage_cfg_path() -> String {
    "/etc/pve/storage.cfg".to_string()
}

fn default_lvm_snapshot_size() -> String {
    "1G".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_cfg_path: default_storage_cfg_path(),
            lvm_snapshot_size: default_lvm_snapshot_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

fn default_name_prefix() -> String {
    "pre_update".to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Upper bound for one container's refresh + upgrade + cleanup
    #[serde(default = "default_update_timeout")]
    pub timeout_secs: u64,
}

fn default_update_timeout() -> u64 {
    1800
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_update_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Node name for task queries; local hostname when unset
    #[serde(default)]
    pub node: Option<String>,

    #[serde(default = "default_task_dir")]
    pub task_dir: String,

    #[serde(default = "default_type_tag")]
    pub type_tag: String,

    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: i64,
}

fn default_task_dir() -> String {
    "/var/log/pve/tasks".to_string()
}

fn default_type_tag() -> String {
    "vzdump".to_string()
}

fn default_lookback_days() -> i64 {
    1
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            node: None,
            task_dir: default_task_dir(),
            type_tag: default_type_tag(),
            default_lookback_days: default_lookback_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StewardConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

impl StewardConfig {
    /// Load config from an explicit path, or the default path, or defaults.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => {
                let default_path = Path::new(CONFIG_PATH);
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                Self::load_from_path(default_path).or_else(|e| {
                    warn!("Config at {} unreadable, using defaults: {}", CONFIG_PATH, e);
                    Ok(Self::default())
                })
            }
        }
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StewardError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: StewardConfig = toml::from_str(content)?;
        if config.snapshot.name_prefix.is_empty() {
            return Err(StewardError::Config("snapshot.name_prefix must not be empty".into()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StewardConfig::default();
        assert_eq!(config.storage.storage_cfg_path, "/etc/pve/storage.cfg");
        assert_eq!(config.storage.lvm_snapshot_size, "1G");
        assert_eq!(config.snapshot.name_prefix, "pre_update");
        assert_eq!(config.audit.type_tag, "vzdump");
        assert_eq!(config.audit.default_lookback_days, 1);
        assert!(config.audit.node.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StewardConfig::from_toml(
            r#"
            [audit]
            node = "pve2"
            default_lookback_days = 3

            [update]
            timeout_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.audit.node.as_deref(), Some("pve2"));
        assert_eq!(config.audit.default_lookback_days, 3);
        assert_eq!(config.audit.task_dir, "/var/log/pve/tasks");
        assert_eq!(config.update.timeout_secs, 60);
        assert_eq!(config.storage.lvm_snapshot_size, "1G");
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let err = StewardConfig::from_toml("[snapshot]\nname_prefix = \"\"\n").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(StewardConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\nlvm_snapshot_size = \"2G\"").unwrap();
        let config = StewardConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.storage.lvm_snapshot_size, "2G");
    }
}
