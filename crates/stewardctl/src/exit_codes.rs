//! Exit codes for stewardctl

use steward_common::StewardError;

/// Exit code for success (reports may still contain skips and running tasks)
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code when a report carries at least one failure
pub const EXIT_FAILURES: i32 = 1;

/// Exit code for fatal misuse: bad lookback, no containers, bad config
pub const EXIT_FATAL: i32 = 2;

/// Exit code when interrupted by SIGINT/SIGTERM
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit code for an error that ended the run before a report existed.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StewardError>())
        .map(StewardError::exit_code)
        .unwrap_or(EXIT_FATAL)
}

/// Exit code for a finished run.
pub fn for_failures(has_failures: bool) -> i32 {
    if has_failures {
        EXIT_FAILURES
    } else {
        EXIT_SUCCESS
    }
}
