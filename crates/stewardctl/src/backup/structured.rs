//! Structured-query task source (the host's task API).

use super::{SourceBatch, SourceUnavailable, TaskQuery, TaskSource};
use crate::runtime::HostRuntime;
use async_trait::async_trait;
use std::sync::Arc;
use steward_common::parsers::{parse_task_list, workload_from_id, TaskEntry};
use steward_common::{BackupTaskRecord, DataSourceKind, TaskStatus};
use tracing::debug;

pub struct StructuredQuerySource {
    host: Arc<dyn HostRuntime>,
}

impl StructuredQuerySource {
    pub fn new(host: Arc<dyn HostRuntime>) -> Self {
        Self { host }
    }

    fn unavailable(reason: impl Into<String>) -> SourceUnavailable {
        SourceUnavailable::new(DataSourceKind::StructuredQuery, reason)
    }
}

fn matches_type(entry: &TaskEntry, tag: &str) -> bool {
    if entry.task_type.is_empty() {
        entry.upid.contains(&format!(":{}:", tag))
    } else {
        entry.task_type == tag
    }
}

fn to_record(entry: TaskEntry) -> BackupTaskRecord {
    BackupTaskRecord {
        workload: workload_from_id(entry.id.as_deref().unwrap_or("")),
        status: TaskStatus::classify(entry.status.as_deref()),
        start_time: entry.starttime,
        end_time: entry.endtime,
        upid: entry.upid,
    }
}

#[async_trait]
impl TaskSource for StructuredQuerySource {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::StructuredQuery
    }

    async fn collect(&self, query: &TaskQuery) -> Result<SourceBatch, SourceUnavailable> {
        if !self.host.task_api_available().await {
            return Err(Self::unavailable("task API not installed"));
        }

        let raw = self
            .host
            .query_tasks(&query.node, &query.type_tag, query.cutoff)
            .await
            .map_err(|e| Self::unavailable(format!("{:#}", e)))?;

        let entries = parse_task_list(&raw)
            .map_err(|e| Self::unavailable(format!("unparseable task list: {}", e)))?;
        debug!("Task API returned {} entries", entries.len());

        let records = entries
            .into_iter()
            .filter(|e| query.in_window(e.starttime))
            .filter(|e| matches_type(e, &query.type_tag))
            .map(to_record)
            .collect();

        Ok(SourceBatch {
            records,
            skipped_lines: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeHostBuilder, FakeTaskApi};

    fn query() -> TaskQuery {
        TaskQuery {
            node: "pve1".into(),
            type_tag: "vzdump".into(),
            cutoff: 1_736_000_000,
        }
    }

    #[tokio::test]
    async fn test_missing_api_is_unavailable() {
        let host = Arc::new(FakeHostBuilder::new().task_api(FakeTaskApi::Missing).build());
        let err = StructuredQuerySource::new(host).collect(&query()).await.unwrap_err();
        assert_eq!(err.source_kind, DataSourceKind::StructuredQuery);
    }

    #[tokio::test]
    async fn test_query_failure_is_unavailable_not_empty() {
        let host = Arc::new(
            FakeHostBuilder::new()
                .task_api(FakeTaskApi::Fails("500 internal error".into()))
                .build(),
        );
        assert!(StructuredQuerySource::new(host).collect(&query()).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_json_is_unavailable() {
        let host = Arc::new(
            FakeHostBuilder::new()
                .task_api(FakeTaskApi::Returns("<html>".into()))
                .build(),
        );
        assert!(StructuredQuerySource::new(host).collect(&query()).await.is_err());
    }

    #[tokio::test]
    async fn test_records_filtered_and_normalized() {
        let json = r#"[
            {"upid":"UPID:pve1:1:2:677A1D00:vzdump:101:root@pam:","type":"vzdump","starttime":1736000000,"endtime":1736000100,"id":"101","status":"OK"},
            {"upid":"UPID:pve1:1:2:677A1CFF:vzdump:102:root@pam:","type":"vzdump","starttime":1735999999,"id":"102","status":"OK"},
            {"upid":"UPID:pve1:1:2:677A1D10:qmstart:103:root@pam:","type":"qmstart","starttime":1736000016,"id":"103","status":"OK"},
            {"upid":"UPID:pve1:1:2:677A1D20:vzdump::root@pam:","type":"vzdump","starttime":1736000032}
        ]"#;
        let host = Arc::new(
            FakeHostBuilder::new()
                .task_api(FakeTaskApi::Returns(json.into()))
                .build(),
        );
        let batch = StructuredQuerySource::new(host).collect(&query()).await.unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].workload, "101");
        assert_eq!(batch.records[0].status, TaskStatus::Ok);
        assert_eq!(batch.records[0].end_time, Some(1_736_000_100));
        assert_eq!(batch.records[1].workload, "n/a");
        assert_eq!(batch.records[1].status, TaskStatus::Running);
    }
}
