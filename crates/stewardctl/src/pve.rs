//! Proxmox VE host backed by `pct`, `zfs`, `lvm2` and `pvesh`.

use crate::runtime::{ExecOutput, HostRuntime, SnapshotAttempt};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use steward_common::parsers::{parse_pct_list, parse_rootfs, parse_storage_cfg, StoragePool};
use steward_common::{ContainerHandle, StorageRef};
use tokio::process::Command;
use tracing::debug;

/// Upper bound on tasks returned by one structured query
const TASK_QUERY_LIMIT: &str = "10000";

pub struct PveHost {
    storage_cfg_path: PathBuf,
}

impl PveHost {
    pub fn new(storage_cfg_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_cfg_path: storage_cfg_path.into(),
        }
    }

    /// Spawn a host command. Children are killed if the caller is dropped.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        debug!("Executing: {} {:?}", program, args);

        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", program))
    }

    /// Run a snapshot command, mapping "already exists" style errors.
    async fn run_snapshot(&self, program: &str, args: &[&str]) -> Result<SnapshotAttempt> {
        let output = self.run(program, args).await?;
        if output.status.success() {
            return Ok(SnapshotAttempt::Created);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_name_collision(&stderr) {
            debug!("{} snapshot already present: {}", program, stderr.trim());
            return Ok(SnapshotAttempt::AlreadyExists);
        }
        anyhow::bail!("{} snapshot failed: {}", program, stderr.trim())
    }

    async fn succeeds(&self, program: &str, args: &[&str]) -> bool {
        self.run(program, args)
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

fn is_name_collision(stderr: &str) -> bool {
    stderr.contains("already exists") || stderr.contains("already used")
}

#[async_trait]
impl HostRuntime for PveHost {
    async fn list_containers(&self) -> Result<Vec<ContainerHandle>> {
        let output = self.run("pct", &["list"]).await?;
        if !output.status.success() {
            anyhow::bail!(
                "pct list failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(parse_pct_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn container_rootfs(&self, vmid: u32) -> Result<Option<StorageRef>> {
        let id = vmid.to_string();
        let output = self.run("pct", &["config", id.as_str()]).await?;
        if !output.status.success() {
            anyhow::bail!(
                "pct config {} failed: {}",
                vmid,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(parse_rootfs(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn storage_pool(&self, name: &str) -> Result<Option<StoragePool>> {
        let content = tokio::fs::read_to_string(&self.storage_cfg_path)
            .await
            .with_context(|| format!("Failed to read {}", self.storage_cfg_path.display()))?;

        Ok(parse_storage_cfg(&content)
            .into_iter()
            .find(|pool| pool.name == name))
    }

    async fn zfs_dataset_exists(&self, dataset: &str) -> bool {
        self.succeeds("zfs", &["list", "-H", "-o", "name", dataset]).await
    }

    async fn zfs_snapshot(&self, target: &str) -> Result<SnapshotAttempt> {
        self.run_snapshot("zfs", &["snapshot", target]).await
    }

    async fn lv_exists(&self, lv_path: &str) -> bool {
        self.succeeds("lvdisplay", &[lv_path]).await
    }

    async fn lv_snapshot(&self, lv_path: &str, snapshot_lv: &str, size: &str) -> Result<SnapshotAttempt> {
        self.run_snapshot(
            "lvcreate",
            &["--snapshot", "--name", snapshot_lv, "--size", size, lv_path],
        )
        .await
    }

    async fn container_snapshot(&self, vmid: u32, name: &str, description: &str) -> Result<SnapshotAttempt> {
        let id = vmid.to_string();
        self.run_snapshot("pct", &["snapshot", id.as_str(), name, "--description", description])
            .await
    }

    async fn exec(&self, vmid: u32, argv: &[String]) -> Result<ExecOutput> {
        let id = vmid.to_string();
        let mut args: Vec<&str> = vec!["exec", id.as_str(), "--"];
        args.extend(argv.iter().map(String::as_str));

        let output = self.run("pct", &args).await?;
        Ok(ExecOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn task_api_available(&self) -> bool {
        self.succeeds("which", &["pvesh"]).await
    }

    async fn query_tasks(&self, node: &str, type_filter: &str, since: i64) -> Result<String> {
        let args = task_query_args(node, type_filter, since);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run("pvesh", &args).await?;

        if !output.status.success() {
            anyhow::bail!(
                "pvesh task query failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// `pvesh get` arguments for the node task list. `--source all` includes
/// tasks still listed in the active file, not only archived ones.
fn task_query_args(node: &str, type_filter: &str, since: i64) -> Vec<String> {
    vec![
        "get".to_string(),
        format!("/nodes/{}/tasks", node),
        "--typefilter".to_string(),
        type_filter.to_string(),
        "--since".to_string(),
        since.to_string(),
        "--source".to_string(),
        "all".to_string(),
        "--limit".to_string(),
        TASK_QUERY_LIMIT.to_string(),
        "--output-format".to_string(),
        "json".to_string(),
    ]
}
