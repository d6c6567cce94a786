//! Fleet Update Orchestrator
//!
//! Discovers the running set once, then takes each container through
//! Discovered -> Snapshotting -> Classifying -> Updating | SkippedUnknownOs
//! -> Reported, one container at a time. A container's failure is captured
//! in its report and never stops the loop.

use crate::executor::UpdateExecutor;
use crate::prober;
use crate::resolver;
use crate::runtime::HostRuntime;
use crate::snapshotter::Snapshotter;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use steward_common::{
    ContainerHandle, ContainerReport, ContainerStage, FleetReport, SnapshotName, StewardConfig,
    StewardError, UpdateOutcome,
};
use tracing::{debug, error, info, info_span, Instrument};

pub struct FleetOrchestrator {
    host: Arc<dyn HostRuntime>,
    config: StewardConfig,
}

impl FleetOrchestrator {
    pub fn new(host: Arc<dyn HostRuntime>, config: StewardConfig) -> Self {
        Self { host, config }
    }

    /// Running containers at this moment, optionally narrowed to one ID.
    pub async fn discover(&self, target: Option<u32>) -> Result<Vec<ContainerHandle>> {
        let containers = self
            .host
            .list_containers()
            .await
            .context("Failed to query container registry")?;

        let running: Vec<ContainerHandle> = containers.into_iter().filter(|c| c.is_running()).collect();

        if let Some(vmid) = target {
            return match running.into_iter().find(|c| c.vmid == vmid) {
                Some(ct) => Ok(vec![ct]),
                None => Err(StewardError::ContainerNotRunning(vmid).into()),
            };
        }

        if running.is_empty() {
            return Err(StewardError::NoRunningContainers.into());
        }
        Ok(running)
    }

    /// One complete fleet run. Errors only for fatal conditions found
    /// during discovery; per-container problems end up in the report.
    pub async fn run(&self, target: Option<u32>, today: NaiveDate) -> Result<FleetReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let containers = self.discover(target).await?;
        let name = SnapshotName::for_date(&self.config.snapshot.name_prefix, today);

        info!(
            "Fleet run {} starting: {} running container(s), snapshot name {}",
            run_id,
            containers.len(),
            name
        );

        for ct in &containers {
            debug!("Container {}: {}", ct.vmid, ContainerStage::Discovered);
        }

        let mut report = FleetReport::new(&run_id, Utc::now());
        for ct in &containers {
            let span = info_span!("container", run_id = %run_id, vmid = ct.vmid, name = %ct.name);
            let result = self.process_container(ct, &name).instrument(span).await;
            debug!("Container {}: {}", ct.vmid, ContainerStage::Reported);
            report.record(result);
        }
        report.finish(Utc::now());

        info!(
            "Fleet run {} finished: {} ok, {} failed, {} skipped (unknown OS)",
            run_id, report.success, report.failure, report.skipped_unknown_os
        );
        Ok(report)
    }

    async fn process_container(&self, ct: &ContainerHandle, name: &SnapshotName) -> ContainerReport {
        let started = Instant::now();
        let host = self.host.as_ref();

        debug!("Container {}: {}", ct.vmid, ContainerStage::Snapshotting);
        let descriptor = resolver::resolve_container(host, ct.vmid).await;
        let snapshot = Snapshotter::new(host, &self.config.storage)
            .acquire(&descriptor, name)
            .await;

        debug!("Container {}: {}", ct.vmid, ContainerStage::Classifying);
        let os = prober::classify(host, ct.vmid).await;

        let (outcome, failed_at, error) = if !os.is_known() {
            info!(
                "Container {}: {}, no update applied",
                ct.vmid,
                ContainerStage::SkippedUnknownOs
            );
            (UpdateOutcome::SkippedUnknownOs, None, None)
        } else {
            debug!("Container {}: {}", ct.vmid, ContainerStage::Updating);
            let executor = UpdateExecutor::new(host, Duration::from_secs(self.config.update.timeout_secs));
            match executor.apply(ct.vmid, os).await {
                Ok(result) if result.outcome == UpdateOutcome::Success => (UpdateOutcome::Success, None, None),
                Ok(result) => (result.outcome, Some(ContainerStage::Updating), result.detail),
                Err(e) => {
                    error!("Container {} update errored: {:#}", ct.vmid, e);
                    (
                        UpdateOutcome::Failure,
                        Some(ContainerStage::Updating),
                        Some(format!("{:#}", e)),
                    )
                }
            }
        };

        ContainerReport {
            vmid: ct.vmid,
            name: ct.name.clone(),
            storage: descriptor.kind,
            snapshot,
            os,
            outcome,
            failed_at,
            error,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}
