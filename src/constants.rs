#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

/// File extension both the base solution and submissions are written in.
pub const SCRIPT_EXTENSION: &str = "py";

/// Default wall-clock limit for one script execution.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Filename prefixes of known non-entry-point utility modules.
///
/// Main-script resolution skips files starting with these prefixes. This is
/// a coarse heuristic: when a folder holds several scripts that all survive
/// the deny list, the first in sorted order wins.
pub const DENY_PREFIXES: &[&str] = &["fibonacci_ratio", "graphics"];

/// Folders starting with this prefix are never submission candidates
/// (`__pycache__`, `__MACOSX`, and friends).
pub const RESERVED_FOLDER_PREFIX: &str = "__";

/// Environment variable overriding the execution timeout, in whole seconds.
pub const TIMEOUT_ENV: &str = "DIFFGRADE_TIMEOUT_SECS";

/// Environment variable holding comma-separated deny-list prefixes.
pub const DENY_PREFIXES_ENV: &str = "DIFFGRADE_DENY_PREFIXES";

/// Environment variable pointing at the interpreter to use instead of the
/// one found on PATH.
pub const PYTHON_ENV: &str = "DIFFGRADE_PYTHON";
