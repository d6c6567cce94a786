//! Backup audit: two task sources behind one trait, and the reconciler that
//! picks between them.

pub mod raw_index;
pub mod reconciler;
pub mod structured;

pub use raw_index::RawIndexSource;
pub use reconciler::BackupAuditor;
pub use structured::StructuredQuerySource;

use async_trait::async_trait;
use steward_common::{BackupTaskRecord, DataSourceKind};
use thiserror::Error;

/// What every source is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub node: String,
    /// Task type tag, e.g. `vzdump`
    pub type_tag: String,
    /// Earliest start time included, epoch seconds
    pub cutoff: i64,
}

impl TaskQuery {
    /// Start times at the cutoff are inside the window.
    pub fn in_window(&self, start_time: i64) -> bool {
        start_time >= self.cutoff
    }
}

/// Records from one source, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBatch {
    pub records: Vec<BackupTaskRecord>,
    /// Lines dropped because they could not be decoded
    pub skipped_lines: usize,
}

/// The source cannot be read at all; the reconciler should try the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_kind} source unavailable: {reason}")]
pub struct SourceUnavailable {
    pub source_kind: DataSourceKind,
    pub reason: String,
}

impl SourceUnavailable {
    pub fn new(source_kind: DataSourceKind, reason: impl Into<String>) -> Self {
        Self {
            source_kind,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait TaskSource: Send + Sync {
    fn kind(&self) -> DataSourceKind;

    async fn collect(&self, query: &TaskQuery) -> Result<SourceBatch, SourceUnavailable>;
}
