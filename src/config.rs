#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Environment-backed settings with constant fallbacks.

use std::{path::PathBuf, time::Duration};

use crate::constants::{DEFAULT_EXEC_TIMEOUT, DENY_PREFIXES, DENY_PREFIXES_ENV, PYTHON_ENV, TIMEOUT_ENV};

/// Returns the wall-clock limit applied to each script execution.
pub fn exec_timeout() -> Duration {
    parse_timeout_secs(std::env::var(TIMEOUT_ENV).ok(), DEFAULT_EXEC_TIMEOUT)
}

/// Returns the filename prefixes excluded from main-script resolution.
pub fn deny_prefixes() -> Vec<String> {
    parse_deny_prefixes(std::env::var(DENY_PREFIXES_ENV).ok())
}

/// Returns the interpreter override, if one is configured.
pub fn python_override() -> Option<PathBuf> {
    std::env::var(PYTHON_ENV)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Parses an optional seconds value into a `Duration`, falling back to
/// `default` when the value is missing or unparsable.
fn parse_timeout_secs(val: Option<String>, default: Duration) -> Duration {
    val.and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Parses an optional comma-separated prefix list, falling back to the
/// built-in deny list when the value is missing or empty.
fn parse_deny_prefixes(val: Option<String>) -> Vec<String> {
    let parsed: Vec<String> = val
        .map(|value| {
            value
                .split(',')
                .map(|prefix| prefix.trim().to_owned())
                .filter(|prefix| !prefix.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if parsed.is_empty() {
        DENY_PREFIXES.iter().map(|prefix| (*prefix).to_owned()).collect()
    } else {
        parsed
    }
}
