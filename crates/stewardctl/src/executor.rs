//! Update Executor - run the OS-specific update inside one container
//!
//! One refresh + upgrade + cleanup per OS family, run as a single shell
//! command. Non-zero exit or timeout is a failure. No retries within a run.

use crate::runtime::HostRuntime;
use anyhow::{anyhow, Result};
use std::time::Duration;
use steward_common::{OsFamily, UpdateOutcome};
use tracing::{info, warn};

/// Update command for an OS family; None for `unknown`.
pub fn update_command(os: OsFamily) -> Option<&'static str> {
    match os {
        OsFamily::Debian => Some(
            "export DEBIAN_FRONTEND=noninteractive && apt-get update \
             && apt-get -y -o Dpkg::Options::=--force-confold dist-upgrade \
             && apt-get -y autoremove --purge && apt-get clean",
        ),
        OsFamily::Alpine => Some("apk update && apk upgrade --available && rm -rf /var/cache/apk/*"),
        OsFamily::Arch => Some("pacman -Syu --noconfirm && pacman -Sc --noconfirm"),
        OsFamily::Fedora => Some("dnf -y upgrade --refresh && dnf -y autoremove && dnf clean all"),
        OsFamily::Unknown => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub outcome: UpdateOutcome,
    pub detail: Option<String>,
}

impl UpdateResult {
    fn success() -> Self {
        Self {
            outcome: UpdateOutcome::Success,
            detail: None,
        }
    }

    fn failure(detail: String) -> Self {
        Self {
            outcome: UpdateOutcome::Failure,
            detail: Some(detail),
        }
    }
}

pub struct UpdateExecutor<'a> {
    host: &'a dyn HostRuntime,
    timeout: Duration,
}

impl<'a> UpdateExecutor<'a> {
    pub fn new(host: &'a dyn HostRuntime, timeout: Duration) -> Self {
        Self { host, timeout }
    }

    /// Apply updates. Errors only when the exec primitive itself errors or
    /// the OS family has no update capability.
    pub async fn apply(&self, vmid: u32, os: OsFamily) -> Result<UpdateResult> {
        let command = update_command(os).ok_or_else(|| anyhow!("no update capability for OS '{}'", os))?;
        let argv = vec!["sh".to_string(), "-c".to_string(), command.to_string()];

        info!("Updating container {} ({})", vmid, os);

        // Dropping the exec future on timeout kills the child process.
        let output = match tokio::time::timeout(self.timeout, self.host.exec(vmid, &argv)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Update of container {} timed out after {:?}", vmid, self.timeout);
                return Ok(UpdateResult::failure(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if output.success() {
            info!("Container {} updated", vmid);
            return Ok(UpdateResult::success());
        }

        let code = output
            .status
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let detail = match output.stderr_tail() {
            Some(tail) => format!("exit {}: {}", code, tail),
            None => format!("exit {}", code),
        };
        warn!("Update of container {} failed ({})", vmid, detail);
        Ok(UpdateResult::failure(detail))
    }
}
