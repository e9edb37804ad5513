#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use glob::glob;
use which::which;

use crate::{config, constants::SCRIPT_EXTENSION};

/// Finds and returns the path to the Python interpreter.
///
/// Honors the `DIFFGRADE_PYTHON` override first, then looks for `python3`
/// and `python` on the PATH.
pub fn python_path() -> Result<OsString> {
    if let Some(path) = config::python_override() {
        return Ok(path.into_os_string());
    }

    which("python3")
        .or_else(|_| which("python"))
        .map(PathBuf::into_os_string)
        .context("Cannot find a Python interpreter on path (python3 or python)")
}

/// Returns the top-level script files directly inside `dir`, in sorted order.
///
/// Sorted order is what makes discovery "stable and consistent" between the
/// base run and every submission run.
pub fn find_scripts(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join(format!("*.{SCRIPT_EXTENSION}"));
    let pattern = pattern
        .to_str()
        .with_context(|| format!("Could not convert {} to a glob pattern", dir.display()))?
        .to_string();

    Ok(glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect())
}
