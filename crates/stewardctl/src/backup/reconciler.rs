//! Backup Audit Reconciler
//!
//! Tries sources in priority order (structured query, then raw index) and
//! builds the report from the first one that answers.

use super::{RawIndexSource, StructuredQuerySource, TaskQuery, TaskSource};
use crate::runtime::HostRuntime;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use steward_common::config::AuditConfig;
use steward_common::{BackupAuditReport, LookbackWindow};
use tracing::{info, warn};

pub struct BackupAuditor {
    sources: Vec<Box<dyn TaskSource>>,
    type_tag: String,
}

impl BackupAuditor {
    /// Sources are tried in the order given.
    pub fn new(sources: Vec<Box<dyn TaskSource>>, type_tag: &str) -> Self {
        Self {
            sources,
            type_tag: type_tag.to_string(),
        }
    }

    /// Structured query first, raw index second.
    pub fn for_host(host: Arc<dyn HostRuntime>, config: &AuditConfig) -> Self {
        Self::new(
            vec![
                Box::new(StructuredQuerySource::new(host)),
                Box::new(RawIndexSource::new(&config.task_dir)),
            ],
            &config.type_tag,
        )
    }

    pub async fn audit(&self, node: &str, window: LookbackWindow, now: DateTime<Utc>) -> BackupAuditReport {
        let query = TaskQuery {
            node: node.to_string(),
            type_tag: self.type_tag.clone(),
            cutoff: window.cutoff(now.timestamp()),
        };

        for source in &self.sources {
            match source.collect(&query).await {
                Ok(batch) => {
                    info!(
                        "Backup audit via {}: {} task(s) since {}",
                        source.kind(),
                        batch.records.len(),
                        query.cutoff
                    );
                    if batch.skipped_lines > 0 {
                        warn!("{} undecodable task line(s) skipped", batch.skipped_lines);
                    }
                    return BackupAuditReport::from_records(
                        node,
                        window,
                        now,
                        source.kind(),
                        batch.records,
                        batch.skipped_lines,
                    );
                }
                Err(e) => warn!("{}, trying next source", e),
            }
        }

        warn!("No backup task source available on {}", node);
        BackupAuditReport::no_source(node, window, now)
    }
}
