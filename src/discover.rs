#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Submission discovery and main-script resolution.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    config,
    constants::{RESERVED_FOLDER_PREFIX, SCRIPT_EXTENSION},
    util::find_scripts,
};

/// How submissions are laid out under the assignment root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every top-level script file is one submission.
    File,
    /// Every top-level subfolder holding scripts is one submission.
    Folder,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Mode::File),
            "folder" => Ok(Mode::Folder),
            other => Err(format!("unknown mode `{other}`, expected `file` or `folder`")),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::File => write!(f, "file"),
            Mode::Folder => write!(f, "folder"),
        }
    }
}

/// Conditions that make discovery fail, for one submission or the session.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The assignment root has no qualifying submissions at all.
    #[error("no qualifying submissions under {}", .root.display())]
    NoSubmissions {
        /// Assignment root that was searched.
        root: PathBuf,
    },

    /// A submission folder holds no script files.
    #[error("no .{ext} scripts in {}", .folder.display(), ext = SCRIPT_EXTENSION)]
    NoScripts {
        /// The folder that failed resolution.
        folder: PathBuf,
    },

    /// A path expected to exist does not, or is the wrong kind.
    #[error("{} is not a {expected}", .path.display())]
    BadPath {
        /// The offending path.
        path:     PathBuf,
        /// What the path was expected to be.
        expected: &'static str,
    },

    /// Listing a directory failed.
    #[error("could not read {}: {source}", .dir.display())]
    Unreadable {
        /// Directory that could not be listed.
        dir:    PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// One student's entry, resolved and ready to run.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Display name: the file name in file mode, the folder name otherwise.
    pub name:        String,
    /// Working directory for this submission's runs.
    pub root:        PathBuf,
    /// The script the harness executes.
    pub main_script: PathBuf,
}

/// A discovered submission candidate: usable, or reportable as a hard
/// failure. Unusable candidates are never silently skipped.
#[derive(Debug)]
pub enum Candidate {
    /// Resolution succeeded; the submission can be graded.
    Ready(Submission),
    /// Resolution failed; the submission must be reported as failed.
    Unusable {
        /// Display name of the submission.
        name:   String,
        /// Why resolution failed.
        reason: DiscoveryError,
    },
}

/// Enumerates submission candidates under `root`, in sorted order.
///
/// Fails with [`DiscoveryError::NoSubmissions`] when nothing qualifies;
/// that is fatal to a grading session.
pub fn resolve_submissions(root: &Path, mode: Mode) -> Result<Vec<Candidate>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::BadPath {
            path:     root.to_path_buf(),
            expected: "directory",
        });
    }

    let candidates = match mode {
        Mode::File => resolve_file_mode(root)?,
        Mode::Folder => resolve_folder_mode(root)?,
    };

    if candidates.is_empty() {
        return Err(DiscoveryError::NoSubmissions {
            root: root.to_path_buf(),
        });
    }

    debug!(count = candidates.len(), %mode, "resolved submission candidates");
    Ok(candidates)
}

/// File mode: every top-level script file is both the submission identity
/// and its main script, run from its own directory.
fn resolve_file_mode(root: &Path) -> Result<Vec<Candidate>, DiscoveryError> {
    Ok(find_scripts(root)
        .map_err(|_| DiscoveryError::BadPath {
            path:     root.to_path_buf(),
            expected: "directory",
        })?
        .into_iter()
        .map(|script| {
            let name = file_name_of(&script);
            Candidate::Ready(Submission {
                name,
                root: script.parent().unwrap_or(root).to_path_buf(),
                main_script: script,
            })
        })
        .collect())
}

/// Folder mode: every top-level subfolder outside the reserved prefix is a
/// candidate; main-script resolution decides whether it is usable.
fn resolve_folder_mode(root: &Path) -> Result<Vec<Candidate>, DiscoveryError> {
    let entries = std::fs::read_dir(root).map_err(|source| DiscoveryError::Unreadable {
        dir: root.to_path_buf(),
        source,
    })?;

    let mut folders: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| !file_name_of(path).starts_with(RESERVED_FOLDER_PREFIX))
        .collect();
    folders.sort();

    Ok(folders
        .into_iter()
        .map(|folder| {
            let name = file_name_of(&folder);
            match find_main_script(&folder) {
                Ok(main_script) => Candidate::Ready(Submission {
                    name,
                    root: folder,
                    main_script,
                }),
                Err(reason) => Candidate::Unusable { name, reason },
            }
        })
        .collect())
}

/// Picks the main script within a submission folder.
///
/// First script (sorted order) whose name does not start with a denied
/// utility prefix wins; when every script is denied the first one found is
/// used anyway. A folder with no scripts fails resolution.
pub fn find_main_script(folder: &Path) -> Result<PathBuf, DiscoveryError> {
    let scripts = find_scripts(folder).map_err(|_| DiscoveryError::BadPath {
        path:     folder.to_path_buf(),
        expected: "directory",
    })?;

    if scripts.is_empty() {
        return Err(DiscoveryError::NoScripts {
            folder: folder.to_path_buf(),
        });
    }

    let deny = config::deny_prefixes();
    let preferred = scripts.iter().find(|script| {
        let name = file_name_of(script);
        !deny.iter().any(|prefix| name.starts_with(prefix.as_str()))
    });

    Ok(preferred.unwrap_or(&scripts[0]).clone())
}

/// Resolves the reference solution into a runnable submission.
///
/// In file mode `path` is the script itself, run from its own directory;
/// in folder mode `path` is a folder resolved like any submission.
pub fn resolve_base(path: &Path, mode: Mode) -> Result<Submission, DiscoveryError> {
    match mode {
        Mode::File => {
            if !path.is_file() {
                return Err(DiscoveryError::BadPath {
                    path:     path.to_path_buf(),
                    expected: "file",
                });
            }
            Ok(Submission {
                name:        file_name_of(path),
                root:        path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
                main_script: path.to_path_buf(),
            })
        }
        Mode::Folder => {
            let main_script = find_main_script(path)?;
            Ok(Submission {
                name: file_name_of(path),
                root: path.to_path_buf(),
                main_script,
            })
        }
    }
}

/// Returns the final path component as an owned string.
fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
