//! Task list returned by the structured task API
//! (`pvesh get /nodes/<node>/tasks --output-format json`).

use serde::{Deserialize, Serialize};

/// One entry of the task list. Running tasks have no status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub upid: String,
    #[serde(rename = "type", default)]
    pub task_type: String,
    pub starttime: i64,
    #[serde(default)]
    pub endtime: Option<i64>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

pub fn parse_task_list(json: &str) -> Result<Vec<TaskEntry>, serde_json::Error> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
}
