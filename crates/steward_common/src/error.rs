//! Error types for pve-steward.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StewardError {
    #[error("Invalid lookback window: {0} day(s), must be at least 1")]
    InvalidLookback(i64),

    #[error("No running containers found on this host")]
    NoRunningContainers,

    #[error("Container {0} is not in the running set")]
    ContainerNotRunning(u32),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl StewardError {
    /// Process exit code for an error that aborts the run before a report exists.
    pub fn exit_code(&self) -> i32 {
        match self {
            StewardError::InvalidLookback(_)
            | StewardError::NoRunningContainers
            | StewardError::ContainerNotRunning(_)
            | StewardError::Config(_)
            | StewardError::Toml(_) => 2,
            StewardError::Parse(_) | StewardError::Io(_) | StewardError::Json(_) => 1,
        }
    }

    /// True for caller misuse that must be reported once and end the run.
    pub fn is_fatal(&self) -> bool {
        self.exit_code() == 2
    }
}

/// Why a task identifier could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpidError {
    #[error("empty line")]
    Empty,

    #[error("identifier does not start with UPID: {0}")]
    NotUpid(String),

    #[error("expected {expected} colon-separated fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field '{field}' is not hex: {value}")]
    BadHex { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, StewardError>;
