//! Command handlers for stewardctl.
//!
//! Each handler returns the process exit code for a finished run; fatal
//! conditions come back as errors and are mapped in `main`.

use crate::backup::BackupAuditor;
use crate::exit_codes;
use crate::orchestrator::FleetOrchestrator;
use crate::report_display::{render_audit, render_fleet, render_json};
use crate::runtime::HostRuntime;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use steward_common::config::AuditConfig;
use steward_common::{BackupAuditReport, FleetReport, LookbackWindow, StewardConfig};
use tracing::warn;

/// Node name for task queries: flag, then config, then local short hostname.
pub fn resolve_node(flag: Option<&str>, config: &AuditConfig) -> String {
    if let Some(node) = flag.or(config.node.as_deref()) {
        return node.to_string();
    }
    match nix::unistd::gethostname() {
        Ok(name) => short_hostname(&name.to_string_lossy()),
        Err(e) => {
            warn!("Cannot read hostname ({}), using localhost", e);
            "localhost".to_string()
        }
    }
}

fn short_hostname(name: &str) -> String {
    name.split('.').next().unwrap_or(name).to_string()
}

/// Lookback from the flag or the configured default. Invalid values are fatal.
pub fn lookback_window(days: Option<i64>, config: &AuditConfig) -> Result<LookbackWindow> {
    Ok(LookbackWindow::new(days.unwrap_or(config.default_lookback_days))?)
}

async fn fleet_report(
    host: Arc<dyn HostRuntime>,
    config: &StewardConfig,
    target: Option<u32>,
) -> Result<FleetReport> {
    let orchestrator = FleetOrchestrator::new(host, config.clone());
    orchestrator.run(target, Utc::now().date_naive()).await
}

async fn audit_report(
    host: Arc<dyn HostRuntime>,
    config: &StewardConfig,
    node: &str,
    window: LookbackWindow,
) -> BackupAuditReport {
    BackupAuditor::for_host(host, &config.audit)
        .audit(node, window, Utc::now())
        .await
}

pub async fn run_update(
    host: Arc<dyn HostRuntime>,
    config: &StewardConfig,
    target: Option<u32>,
    json: bool,
) -> Result<i32> {
    let report = fleet_report(host, config, target).await?;

    if json {
        println!("{}", render_json(&report)?);
    } else {
        print!("{}", render_fleet(&report));
    }
    Ok(exit_codes::for_failures(report.has_failures()))
}

pub async fn run_audit(
    host: Arc<dyn HostRuntime>,
    config: &StewardConfig,
    days: Option<i64>,
    node: Option<&str>,
    json: bool,
) -> Result<i32> {
    let window = lookback_window(days, &config.audit)?;
    let node = resolve_node(node, &config.audit);
    let report = audit_report(host, config, &node, window).await;

    if json {
        println!("{}", render_json(&report)?);
    } else {
        print!("{}", render_audit(&report));
    }
    Ok(exit_codes::for_failures(report.is_failing()))
}

/// Fleet update followed by the backup audit.
pub async fn run_maintain(
    host: Arc<dyn HostRuntime>,
    config: &StewardConfig,
    target: Option<u32>,
    days: Option<i64>,
    node: Option<&str>,
    json: bool,
) -> Result<i32> {
    // Validate the audit arguments before anything is mutated
    let window = lookback_window(days, &config.audit)?;
    let node = resolve_node(node, &config.audit);

    let fleet = fleet_report(host.clone(), config, target).await?;
    let audit = audit_report(host, config, &node, window).await;

    if json {
        let combined = serde_json::json!({
            "fleet": fleet,
            "backup_audit": audit,
        });
        println!("{}", render_json(&combined)?);
    } else {
        print!("{}", render_fleet(&fleet));
        println!();
        print!("{}", render_audit(&audit));
    }
    Ok(exit_codes::for_failures(fleet.has_failures() || audit.is_failing()))
}
