#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Execution harness: one fresh interpreter process per (script, test case).

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use bon::Builder;
use thiserror::Error;
use tracing::debug;

use crate::{
    config,
    process::{self, RunError, StdinSource},
};

/// Classified failure of a single script execution.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// The script exited with a non-zero code.
    #[error("runtime error (exit code {code:?}):\n{stderr}")]
    Runtime {
        /// Exit code reported by the process, if any.
        code:   Option<i32>,
        /// Captured standard error output.
        stderr: String,
    },

    /// The script outlived the wall-clock limit and was killed.
    #[error("execution timed out after {timeout:?}")]
    Timeout {
        /// How long we waited before killing the process.
        timeout: Duration,
    },

    /// The process could not be launched at all.
    #[error("could not launch script: {message}")]
    Launch {
        /// Description of the underlying launch failure.
        message: String,
    },
}

/// Runs scripts one process at a time with input injection and a deadline.
///
/// The harness never retries: exactly one process is spawned per
/// (script, test case) invocation.
#[derive(Debug, Clone, Builder)]
pub struct Runner {
    /// Interpreter binary used to execute scripts.
    interpreter:  OsString,
    /// Wall-clock limit applied to every run.
    #[builder(default = config::exec_timeout())]
    timeout:      Duration,
    /// Optional folder appended to the child's module search path so
    /// submissions can import shared utility modules.
    utility_path: Option<PathBuf>,
}

impl Runner {
    /// Runs `script` from `workdir`, feeding `input` lines to its stdin.
    ///
    /// The interpreter is invoked with the script's filename as its sole
    /// argument; each input line is terminated by a line break. On a clean
    /// exit the captured stdout is returned; every failure is classified
    /// into an [`ExecError`].
    pub async fn run_case(
        &self,
        script: &Path,
        workdir: &Path,
        input: &[String],
    ) -> Result<String, ExecError> {
        let file_name = script
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| ExecError::Launch {
                message: format!("{} has no file name", script.display()),
            })?;

        let mut env = Vec::new();
        if let Some(utility) = &self.utility_path {
            env.push((OsString::from("PYTHONPATH"), module_search_path(utility)));
        }

        debug!(
            script = %script.display(),
            workdir = %workdir.display(),
            lines = input.len(),
            "spawning interpreter"
        );

        let stdin = StdinSource::Bytes(joined_input(input).into_bytes());
        let args = vec![file_name];
        let collected = process::run_collect(
            &self.interpreter,
            &args,
            stdin,
            Some(workdir),
            &env,
            Some(self.timeout),
        )
        .await
        .map_err(|err| match err {
            RunError::Deadline { limit } => ExecError::Timeout { timeout: limit },
            RunError::Io(io) => ExecError::Launch {
                message: format!("{io:#}"),
            },
        })?;

        if collected.status.success() {
            Ok(String::from_utf8_lossy(&collected.stdout).to_string())
        } else {
            Err(ExecError::Runtime {
                code:   collected.status.code(),
                stderr: String::from_utf8_lossy(&collected.stderr).to_string(),
            })
        }
    }

    /// Returns the configured wall-clock limit.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Joins input lines for stdin, each terminated by a line break.
fn joined_input(input: &[String]) -> String {
    let mut joined = input.join("\n");
    joined.push('\n');
    joined
}

/// Builds the child's module search path: the inherited one, if any, with
/// `utility` appended using the platform path-list separator.
fn module_search_path(utility: &Path) -> OsString {
    let sep = if cfg!(windows) { ";" } else { ":" };
    match std::env::var_os("PYTHONPATH") {
        Some(existing) if !existing.is_empty() => {
            let mut value = existing;
            value.push(sep);
            value.push(utility);
            value
        }
        _ => utility.as_os_str().to_os_string(),
    }
}
