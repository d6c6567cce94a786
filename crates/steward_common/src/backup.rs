//! Backup audit data model, adapter independent.

use crate::error::StewardError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workload ID placeholder when a task has none.
pub const NO_WORKLOAD: &str = "n/a";

const SECS_PER_DAY: i64 = 86_400;

/// Caller-supplied lookback, in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackWindow {
    days: u32,
}

impl LookbackWindow {
    pub fn new(days: i64) -> Result<Self, StewardError> {
        if days < 1 || days > i64::from(u32::MAX) {
            return Err(StewardError::InvalidLookback(days));
        }
        Ok(Self { days: days as u32 })
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    /// Earliest start time (epoch seconds) still inside the window.
    pub fn cutoff(&self, now: i64) -> i64 {
        now - i64::from(self.days) * SECS_PER_DAY
    }
}

impl Default for LookbackWindow {
    fn default() -> Self {
        Self { days: 1 }
    }
}

/// Three-state classification of a task's status field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "raw", rename_all = "lowercase")]
pub enum TaskStatus {
    Ok,
    Running,
    Failed(String),
}

impl TaskStatus {
    /// `OK` is ok, missing/blank is running, anything else failed.
    pub fn classify(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => TaskStatus::Running,
            Some("OK") => TaskStatus::Ok,
            Some(other) => TaskStatus::Failed(other.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Ok => write!(f, "OK"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Failed(raw) => write!(f, "{}", raw),
        }
    }
}

/// One backup task, normalized from either source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupTaskRecord {
    pub upid: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub workload: String,
    pub status: TaskStatus,
}

/// Which adapter produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSourceKind {
    StructuredQuery,
    RawIndex,
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceKind::StructuredQuery => write!(f, "structured-query"),
            DataSourceKind::RawIndex => write!(f, "raw-index"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCounts {
    pub ok: usize,
    pub running: usize,
    pub failed: usize,
}

impl AuditCounts {
    pub fn tally(records: &[BackupTaskRecord]) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.status {
                TaskStatus::Ok => counts.ok += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }
}

/// Result of one backup audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupAuditReport {
    pub node: String,
    pub lookback_days: u32,
    pub cutoff: i64,
    pub generated_at: DateTime<Utc>,
    pub source: Option<DataSourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub counts: AuditCounts,
    /// Raw-index lines that could not be decoded
    #[serde(default)]
    pub skipped_lines: usize,
    pub records: Vec<BackupTaskRecord>,
}

impl BackupAuditReport {
    pub fn from_records(
        node: &str,
        window: LookbackWindow,
        now: DateTime<Utc>,
        source: DataSourceKind,
        records: Vec<BackupTaskRecord>,
        skipped_lines: usize,
    ) -> Self {
        Self {
            node: node.to_string(),
            lookback_days: window.days(),
            cutoff: window.cutoff(now.timestamp()),
            generated_at: now,
            source: Some(source),
            note: None,
            counts: AuditCounts::tally(&records),
            skipped_lines,
            records,
        }
    }

    /// Empty report when neither source could be read.
    pub fn no_source(node: &str, window: LookbackWindow, now: DateTime<Utc>) -> Self {
        Self {
            node: node.to_string(),
            lookback_days: window.days(),
            cutoff: window.cutoff(now.timestamp()),
            generated_at: now,
            source: None,
            note: Some("no data source available".to_string()),
            counts: AuditCounts::default(),
            skipped_lines: 0,
            records: Vec::new(),
        }
    }

    /// Failing only when at least one task failed.
    pub fn is_failing(&self) -> bool {
        self.counts.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(TaskStatus::classify(Some("OK")), TaskStatus::Ok);
        assert_eq!(TaskStatus::classify(Some("")), TaskStatus::Running);
        assert_eq!(TaskStatus::classify(Some("   ")), TaskStatus::Running);
        assert_eq!(TaskStatus::classify(None), TaskStatus::Running);
        assert_eq!(
            TaskStatus::classify(Some("job errors")),
            TaskStatus::Failed("job errors".to_string())
        );
        // Case matters: only the exact OK token is success
        assert!(TaskStatus::classify(Some("ok")).is_failed());
    }

    #[test]
    fn test_lookback_rejects_non_positive() {
        assert!(LookbackWindow::new(0).is_err());
        assert!(LookbackWindow::new(-3).is_err());
        assert_eq!(LookbackWindow::new(7).unwrap().days(), 7);
        assert_eq!(LookbackWindow::default().days(), 1);
    }

    #[test]
    fn test_cutoff() {
        let window = LookbackWindow::new(2).unwrap();
        assert_eq!(window.cutoff(1_000_000), 1_000_000 - 2 * 86_400);
    }

    #[test]
    fn test_running_is_not_failing() {
        let records = vec![BackupTaskRecord {
            upid: "UPID:x".into(),
            start_time: 10,
            end_time: None,
            workload: NO_WORKLOAD.into(),
            status: TaskStatus::Running,
        }];
        let report = BackupAuditReport::from_records(
            "pve1",
            LookbackWindow::default(),
            Utc::now(),
            DataSourceKind::RawIndex,
            records,
            0,
        );
        assert_eq!(report.counts.running, 1);
        assert!(!report.is_failing());
    }

    #[test]
    fn test_no_source_report() {
        let report = BackupAuditReport::no_source("pve1", LookbackWindow::default(), Utc::now());
        assert!(report.records.is_empty());
        assert_eq!(report.note.as_deref(), Some("no data source available"));
        assert!(!report.is_failing());
    }
}
