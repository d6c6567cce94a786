//! Report Display - ASCII terminal rendering of fleet and backup reports
//!
//! Status tags: [OK] [FAIL] [SKIP] [RUN]. Reports go to stdout, logs to stderr.

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::fmt::Write;
use steward_common::{
    BackupAuditReport, ContainerReport, FleetReport, SnapshotRecord, TaskStatus, UpdateOutcome,
};

const SEPARATOR: &str = "------------------------------------------------------------";

/// Tag column width; tags are padded before colouring.
const TAG_WIDTH: usize = 6;

fn pad_tag(tag: &str) -> String {
    format!("{:<width$}", tag, width = TAG_WIDTH)
}

fn outcome_tag(outcome: UpdateOutcome) -> String {
    match outcome {
        UpdateOutcome::Success => pad_tag("[OK]").bright_green().to_string(),
        UpdateOutcome::Failure => pad_tag("[FAIL]").bright_red().to_string(),
        UpdateOutcome::SkippedUnknownOs => pad_tag("[SKIP]").yellow().to_string(),
    }
}

fn status_tag(status: &TaskStatus) -> String {
    match status {
        TaskStatus::Ok => pad_tag("[OK]").bright_green().to_string(),
        TaskStatus::Running => pad_tag("[RUN]").cyan().to_string(),
        TaskStatus::Failed(_) => pad_tag("[FAIL]").bright_red().to_string(),
    }
}

fn snapshot_summary(snapshot: &SnapshotRecord) -> String {
    if snapshot.is_created() {
        let reused = if snapshot.reused { ", reused" } else { "" };
        format!("{} via {}{}", snapshot.name, snapshot.backend, reused)
    } else {
        format!("skipped ({})", snapshot.detail.as_deref().unwrap_or("no tier succeeded"))
    }
}

fn container_line(ct: &ContainerReport) -> String {
    let mut line = format!(
        "{} {:<6} {:<20} os={:<8} storage={:<9} snapshot={}",
        outcome_tag(ct.outcome),
        ct.vmid,
        ct.name,
        ct.os.to_string(),
        ct.storage.to_string(),
        snapshot_summary(&ct.snapshot)
    );
    if let Some(error) = &ct.error {
        let _ = write!(line, "\n       {}", error.bright_red());
    }
    line
}

fn format_epoch(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Human-readable fleet report.
pub fn render_fleet(report: &FleetReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[FLEET UPDATE] run {}", report.run_id.dimmed());
    let _ = writeln!(out, "{}", SEPARATOR.dimmed());
    for ct in &report.containers {
        let _ = writeln!(out, "{}", container_line(ct));
    }
    let _ = writeln!(out, "{}", SEPARATOR.dimmed());
    let _ = writeln!(
        out,
        "{} container(s): {} ok, {} failed, {} skipped (unknown OS)",
        report.total(),
        report.success.bright_green(),
        report.failure.bright_red(),
        report.skipped_unknown_os.yellow()
    );
    out
}

/// Human-readable backup audit report.
pub fn render_audit(report: &BackupAuditReport) -> String {
    let mut out = String::new();
    let source = report
        .source
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());

    let _ = writeln!(
        out,
        "[BACKUP AUDIT] node {} - last {} day(s) via {}",
        report.node, report.lookback_days, source
    );
    let _ = writeln!(out, "{}", SEPARATOR.dimmed());

    if let Some(note) = &report.note {
        let _ = writeln!(out, "[NOTE] {}", note.yellow());
    }

    for record in &report.records {
        let end = record
            .end_time
            .map(format_epoch)
            .unwrap_or_else(|| "-".to_string());
        let _ = write!(
            out,
            "{} {:<6} start={} end={}",
            status_tag(&record.status),
            record.workload,
            format_epoch(record.start_time),
            end
        );
        if let TaskStatus::Failed(raw) = &record.status {
            let _ = write!(out, " status={}", raw.bright_red());
        }
        let _ = writeln!(out);
    }

    if report.skipped_lines > 0 {
        let _ = writeln!(out, "[NOTE] {} undecodable index line(s) skipped", report.skipped_lines);
    }

    let _ = writeln!(out, "{}", SEPARATOR.dimmed());
    let _ = writeln!(
        out,
        "{} ok, {} running, {} failed",
        report.counts.ok.bright_green(),
        report.counts.running.cyan(),
        report.counts.failed.bright_red()
    );
    out
}

/// Pretty JSON for `--json`.
pub fn render_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_common::{
        BackendKind, BackupTaskRecord, DataSourceKind, LookbackWindow, OsFamily, SnapshotBackend,
    };

    fn sample_fleet() -> FleetReport {
        let mut report = FleetReport::new("run-1", Utc::now());
        report.record(ContainerReport {
            vmid: 101,
            name: "web".into(),
            storage: BackendKind::Zfs,
            snapshot: SnapshotRecord::created(101, SnapshotBackend::Zfs, "pre_update_2025-01-04", false),
            os: OsFamily::Debian,
            outcome: UpdateOutcome::Success,
            failed_at: None,
            error: None,
            duration_ms: 10,
        });
        report.record(ContainerReport {
            vmid: 102,
            name: "db".into(),
            storage: BackendKind::Generic,
            snapshot: SnapshotRecord::skipped(102, "pre_update_2025-01-04", "container snapshot failed"),
            os: OsFamily::Fedora,
            outcome: UpdateOutcome::Failure,
            failed_at: None,
            error: Some("exit 1: E: broken".into()),
            duration_ms: 10,
        });
        report
    }

    #[test]
    fn test_render_fleet() {
        let text = render_fleet(&sample_fleet());
        assert!(text.contains("[OK]"));
        assert!(text.contains("[FAIL]"));
        assert!(text.contains("pre_update_2025-01-04 via zfs"));
        assert!(text.contains("skipped (container snapshot failed)"));
        assert!(text.contains("exit 1: E: broken"));
        assert!(text.contains("2 container(s)"));
    }

    #[test]
    fn test_render_audit_no_source() {
        let now = Utc::now();
        let report = BackupAuditReport::no_source("pve1", LookbackWindow::default(), now);
        let text = render_audit(&report);
        assert!(text.contains("via none"));
        assert!(text.contains("no data source available"));
    }

    #[test]
    fn test_render_audit_records() {
        let now = Utc::now();
        let records = vec![
            BackupTaskRecord {
                upid: "UPID:pve1:1:2:677A1D00:vzdump:101:root@pam:".into(),
                start_time: 1_736_000_000,
                end_time: None,
                workload: "101".into(),
                status: TaskStatus::Running,
            },
            BackupTaskRecord {
                upid: "UPID:pve1:1:2:677A1D01:vzdump:102:root@pam:".into(),
                start_time: 1_736_000_001,
                end_time: Some(1_736_000_100),
                workload: "102".into(),
                status: TaskStatus::Failed("job errors".into()),
            },
        ];
        let report = BackupAuditReport::from_records(
            "pve1",
            LookbackWindow::default(),
            now,
            DataSourceKind::RawIndex,
            records,
            3,
        );
        let text = render_audit(&report);
        assert!(text.contains("[RUN]"));
        assert!(text.contains("job errors"));
        assert!(text.contains("3 undecodable"));
        assert!(text.contains("2025-01-04"));
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&sample_fleet()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["failure"], 1);
        assert_eq!(value["containers"][0]["snapshot"]["backend"], "zfs");
    }

    fn strip_ansi(text: &str) -> String {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\u{1b}' {
                for c in chars.by_ref() {
                    if c == 'm' {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn test_tags_padded_inside_colour() {
        assert!(outcome_tag(UpdateOutcome::Success).contains("[OK]  "));
        assert!(status_tag(&TaskStatus::Running).contains("[RUN] "));
        assert_eq!(strip_ansi(&outcome_tag(UpdateOutcome::Failure)), "[FAIL]");
    }

    #[test]
    fn test_fleet_columns_line_up() {
        let text = strip_ansi(&render_fleet(&sample_fleet()));
        let rows: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("[OK]") || l.starts_with("[FAIL]"))
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].find("101"), Some(TAG_WIDTH + 1));
        assert_eq!(rows[1].find("102"), Some(TAG_WIDTH + 1));
        assert_eq!(rows[0].find("os="), rows[1].find("os="));
    }
}
