//! Raw task-index source.
//!
//! Reads the `active` task file and the `index`, `index.1`, ... archives from
//! the task log directory, in that order. Lines that do not decode are
//! skipped and counted; the rest of the file is still read.

use super::{SourceBatch, SourceUnavailable, TaskQuery, TaskSource};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use steward_common::parsers::parse_index_line;
use steward_common::{BackupTaskRecord, DataSourceKind, TaskStatus};
use tracing::{debug, warn};

pub struct RawIndexSource {
    task_dir: PathBuf,
}

impl RawIndexSource {
    pub fn new(task_dir: impl Into<PathBuf>) -> Self {
        Self {
            task_dir: task_dir.into(),
        }
    }

    fn unavailable(reason: impl Into<String>) -> SourceUnavailable {
        SourceUnavailable::new(DataSourceKind::RawIndex, reason)
    }
}

/// Sort key for index files: `active` < `index` < `index.1` < `index.2` ...
fn discovery_rank(name: &str) -> Option<(u8, u32)> {
    match name {
        "active" => Some((0, 0)),
        "index" => Some((1, 0)),
        _ => name
            .strip_prefix("index.")
            .and_then(|n| n.parse::<u32>().ok())
            .map(|n| (2, n)),
    }
}

/// Index files under `dir` in discovery order.
pub async fn discover_index_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found: Vec<((u8, u32), PathBuf)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(rank) = discovery_rank(&name) {
            found.push((rank, entry.path()));
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Decode one file's lines into `batch`. Returns the number of lines kept.
fn scan_lines(
    content: &str,
    query: &TaskQuery,
    seen: &mut HashSet<String>,
    batch: &mut SourceBatch,
) -> usize {
    let mut kept = 0;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let parsed = match parse_index_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping undecodable task line ({}): {}", e, line);
                batch.skipped_lines += 1;
                continue;
            }
        };

        if !query.in_window(parsed.upid.start_time) {
            continue;
        }
        if parsed.upid.task_type != query.type_tag {
            continue;
        }
        // A task can sit in both the active file and an index
        if !seen.insert(parsed.upid.raw.clone()) {
            continue;
        }

        batch.records.push(BackupTaskRecord {
            workload: parsed.upid.workload(),
            start_time: parsed.upid.start_time,
            end_time: parsed.end_time,
            status: TaskStatus::classify(parsed.status.as_deref()),
            upid: parsed.upid.raw,
        });
        kept += 1;
    }

    kept
}

#[async_trait]
impl TaskSource for RawIndexSource {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::RawIndex
    }

    async fn collect(&self, query: &TaskQuery) -> Result<SourceBatch, SourceUnavailable> {
        let files = discover_index_files(&self.task_dir)
            .await
            .map_err(|e| Self::unavailable(format!("{}: {}", self.task_dir.display(), e)))?;

        if files.is_empty() {
            return Err(Self::unavailable(format!(
                "no task index files in {}",
                self.task_dir.display()
            )));
        }

        let mut batch = SourceBatch::default();
        let mut seen = HashSet::new();
        let mut readable = 0;

        for file in &files {
            match tokio::fs::read(file).await {
                Ok(bytes) => {
                    readable += 1;
                    let content = String::from_utf8_lossy(&bytes);
                    let kept = scan_lines(&content, query, &mut seen, &mut batch);
                    debug!("{}: {} backup task(s) in window", file.display(), kept);
                }
                Err(e) => warn!("Cannot read task index {}: {}", file.display(), e),
            }
        }

        if readable == 0 {
            return Err(Self::unavailable("no task index file readable"));
        }
        Ok(batch)
    }
}
