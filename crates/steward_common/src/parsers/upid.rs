//! Task identifier (UPID) and task-index line decoding.
//!
//! A UPID is `UPID:<node>:<pid>:<pstart>:<starttime>:<type>:<id>:<user>:`,
//! nine colon fields with the last one empty. Start time is hex encoded.
//! Field count is checked before any field is read so a format change shows
//! up as a decode failure instead of a misread column.

use crate::backup::NO_WORKLOAD;
use crate::error::UpidError;
use serde::{Deserialize, Serialize};

const UPID_FIELDS: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upid {
    pub raw: String,
    pub node: String,
    pub pid: String,
    pub pstart: String,
    pub start_time: i64,
    pub task_type: String,
    pub id: String,
    pub user: String,
}

impl Upid {
    pub fn parse(raw: &str) -> Result<Self, UpidError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(UpidError::Empty);
        }
        if !raw.starts_with("UPID:") {
            return Err(UpidError::NotUpid(raw.to_string()));
        }

        let fields: Vec<&str> = raw.split(':').collect();
        if fields.len() != UPID_FIELDS {
            return Err(UpidError::FieldCount {
                expected: UPID_FIELDS,
                found: fields.len(),
            });
        }

        let start_time = decode_hex_timestamp(fields[4]).map_err(|_| UpidError::BadHex {
            field: "starttime",
            value: fields[4].to_string(),
        })?;

        Ok(Self {
            raw: raw.to_string(),
            node: fields[1].to_string(),
            pid: fields[2].to_string(),
            pstart: fields[3].to_string(),
            start_time,
            task_type: fields[5].to_string(),
            id: fields[6].to_string(),
            user: fields[7].to_string(),
        })
    }

    pub fn workload(&self) -> String {
        workload_from_id(&self.id)
    }
}

/// Decode a hex epoch value. Anything but plain hex digits is rejected.
pub fn decode_hex_timestamp(value: &str) -> Result<i64, UpidError> {
    let bad = || UpidError::BadHex {
        field: "timestamp",
        value: value.to_string(),
    };

    if value.is_empty() || value.len() > 15 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(bad());
    }
    i64::from_str_radix(value, 16).map_err(|_| bad())
}

/// Leading digit run of a task's id field, or the `n/a` sentinel.
pub fn workload_from_id(id: &str) -> String {
    let digits: String = id.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        NO_WORKLOAD.to_string()
    } else {
        digits
    }
}

/// One line of a task index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLine {
    pub upid: Upid,
    pub end_time: Option<i64>,
    /// None or empty while the task is still running
    pub status: Option<String>,
}

fn is_end_time_token(token: &str) -> bool {
    token.len() == 8 && token.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_saved_flag(token: &str) -> bool {
    token == "0" || token == "1"
}

/// Parse `<UPID> [<saved-flag>] [<endtime-hex> <status...>]`.
///
/// The status is everything after the end time and may contain spaces.
pub fn parse_index_line(line: &str) -> Result<IndexLine, UpidError> {
    let mut tokens = line.split_whitespace();
    let upid = Upid::parse(tokens.next().ok_or(UpidError::Empty)?)?;

    let mut rest: Vec<&str> = tokens.collect();

    // Active-file lines may carry a saved flag before the end time.
    if rest.first().map(|t| is_saved_flag(t)).unwrap_or(false)
        && (rest.len() == 1 || is_end_time_token(rest[1]))
    {
        rest.remove(0);
    }

    let (end_time, status_tokens) = match rest.first() {
        Some(token) if is_end_time_token(token) => {
            (Some(decode_hex_timestamp(token)?), &rest[1..])
        }
        _ => (None, &rest[..]),
    };

    let status = if status_tokens.is_empty() {
        None
    } else {
        Some(status_tokens.join(" "))
    };

    Ok(IndexLine {
        upid,
        end_time,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPID: &str = "UPID:pve1:00001A2B:0003C4D5:67890ABC:vzdump:101:root@pam:";

    #[test]
    fn test_decode_hex_exact() {
        assert_eq!(decode_hex_timestamp("67890abc").unwrap(), 0x67890abc);
        assert_eq!(decode_hex_timestamp("67890ABC").unwrap(), 0x67890abc);
    }

    #[test]
    fn test_decode_hex_rejects_garbage() {
        assert!(decode_hex_timestamp("not-hex").is_err());
        assert!(decode_hex_timestamp("").is_err());
        assert!(decode_hex_timestamp("+1234").is_err());
        assert!(decode_hex_timestamp("12 34").is_err());
    }

    #[test]
    fn test_parse_upid() {
        let upid = Upid::parse(UPID).unwrap();
        assert_eq!(upid.node, "pve1");
        assert_eq!(upid.start_time, 0x67890abc);
        assert_eq!(upid.task_type, "vzdump");
        assert_eq!(upid.id, "101");
        assert_eq!(upid.user, "root@pam");
        assert_eq!(upid.workload(), "101");
    }

    #[test]
    fn test_parse_upid_field_count_checked() {
        let short = "UPID:pve1:00001A2B:67890ABC:vzdump:101:root@pam:";
        assert_eq!(
            Upid::parse(short).unwrap_err(),
            UpidError::FieldCount { expected: 9, found: 8 }
        );
        let long = "UPID:pve1:00001A2B:0003C4D5:67890ABC:vzdump:101:extra:root@pam:";
        assert!(matches!(Upid::parse(long), Err(UpidError::FieldCount { found: 10, .. })));
    }

    #[test]
    fn test_parse_upid_bad_start() {
        let bad = "UPID:pve1:00001A2B:0003C4D5:not-hex:vzdump:101:root@pam:";
        assert!(matches!(
            Upid::parse(bad),
            Err(UpidError::BadHex { field: "starttime", .. })
        ));
        assert!(matches!(Upid::parse("garbage"), Err(UpidError::NotUpid(_))));
    }

    #[test]
    fn test_workload_from_id() {
        assert_eq!(workload_from_id("101"), "101");
        assert_eq!(workload_from_id("105abc"), "105");
        assert_eq!(workload_from_id(""), NO_WORKLOAD);
        assert_eq!(workload_from_id("local"), NO_WORKLOAD);
    }

    #[test]
    fn test_index_line_finished() {
        let line = format!("{} 67890B00 OK", UPID);
        let parsed = parse_index_line(&line).unwrap();
        assert_eq!(parsed.end_time, Some(0x67890b00));
        assert_eq!(parsed.status.as_deref(), Some("OK"));
    }

    #[test]
    fn test_index_line_error_status_with_spaces() {
        let line = format!("{} 67890B00 job errors", UPID);
        let parsed = parse_index_line(&line).unwrap();
        assert_eq!(parsed.status.as_deref(), Some("job errors"));
    }

    #[test]
    fn test_index_line_running() {
        let parsed = parse_index_line(UPID).unwrap();
        assert_eq!(parsed.end_time, None);
        assert_eq!(parsed.status, None);

        let flagged = parse_index_line(&format!("{} 1", UPID)).unwrap();
        assert_eq!(flagged.status, None);
    }

    #[test]
    fn test_index_line_saved_flag() {
        let line = format!("{} 1 67890B00 OK", UPID);
        let parsed = parse_index_line(&line).unwrap();
        assert_eq!(parsed.end_time, Some(0x67890b00));
        assert_eq!(parsed.status.as_deref(), Some("OK"));
    }
}
