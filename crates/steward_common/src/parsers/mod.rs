//! Deterministic parsers for host tool output.
//!
//! Nothing in here spawns processes; callers hand in the captured text.

pub mod pct;
pub mod storage_cfg;
pub mod tasks_json;
pub mod upid;

pub use pct::{parse_pct_list, parse_rootfs, parse_storage_ref};
pub use storage_cfg::{parse_storage_cfg, StoragePool};
pub use tasks_json::{parse_task_list, TaskEntry};
pub use upid::{decode_hex_timestamp, parse_index_line, workload_from_id, IndexLine, Upid};
