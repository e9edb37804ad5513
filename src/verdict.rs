#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Per-submission grading data model.

use serde::{Deserialize, Serialize};

use crate::{compare, harness::ExecError};

/// One scripted grading scenario: the ordered stdin lines fed to a program.
///
/// Test cases are captured before a session starts and are identical across
/// the base run and every submission run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestCase {
    /// Input lines, one per expected prompt.
    input: Vec<String>,
}

impl TestCase {
    /// Creates a test case from its input lines.
    pub fn new(input: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            input: input.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the input lines.
    pub fn lines(&self) -> &[String] {
        &self.input
    }

    /// Returns true when the case carries no input lines.
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

/// Outcome of running one script against one test case.
///
/// Created once per (submission, test case) pair and never mutated; a
/// failed execution is terminal for that pair.
#[derive(Debug, Clone)]
pub struct CaseRun {
    /// Zero-based index of the test case.
    pub case_index: usize,
    /// The input lines that were fed to stdin.
    pub input:      Vec<String>,
    /// Captured stdout on success, classified failure otherwise.
    pub outcome:    Result<String, ExecError>,
}

impl CaseRun {
    /// Returns the captured stdout, if the run succeeded.
    pub fn stdout(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }
}

/// Why one test case scored as a failure.
#[derive(Debug, Clone, Serialize)]
pub enum FailureKind {
    /// The submission's process failed (non-zero exit, timeout, or launch
    /// error); no output comparison was attempted.
    Runtime {
        /// Classified execution error text.
        message: String,
    },
    /// The submission ran but its output did not match the reference.
    Mismatch {
        /// Normalized reference output lines.
        expected: Vec<String>,
        /// Normalized submission output lines.
        actual:   Vec<String>,
        /// Line-level diff, for reporting only.
        diff:     String,
    },
}

/// A scored failure for one test case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseFailure {
    /// Zero-based index of the failing test case.
    pub case_index: usize,
    /// What went wrong.
    pub kind:       FailureKind,
}

/// Per-submission aggregate over all test cases.
///
/// Derived entirely from the reference runs and the submission runs; the
/// core never persists it.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    /// Display name of the submission.
    pub submission: String,
    /// Total number of test cases.
    pub total:      usize,
    /// Number of test cases whose output matched the reference.
    pub passed:     usize,
    /// Ordered failure details, one per failing test case.
    pub failures:   Vec<CaseFailure>,
}

impl Verdict {
    /// Score percentage: `passed / total * 100`, 0 when there are no cases.
    pub fn score(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Grades a submission by zipping its runs against the reference runs
/// position by position.
///
/// A run that carries an error scores as a runtime failure without any
/// output comparison; otherwise the outputs are normalized and compared as
/// ordered line sequences.
pub fn grade_submission(name: &str, base: &[CaseRun], submission: &[CaseRun]) -> Verdict {
    let mut passed = 0;
    let mut failures = Vec::new();

    for (base_run, submission_run) in base.iter().zip(submission.iter()) {
        if let Err(err) = &submission_run.outcome {
            failures.push(CaseFailure {
                case_index: submission_run.case_index,
                kind:       FailureKind::Runtime {
                    message: err.to_string(),
                },
            });
            continue;
        }

        if compare::outputs_match(base_run.stdout(), submission_run.stdout()) {
            passed += 1;
        } else {
            let expected = compare::normalize(base_run.stdout().unwrap_or_default());
            let actual = compare::normalize(submission_run.stdout().unwrap_or_default());
            let diff = compare::unified_diff(&expected, &actual);
            failures.push(CaseFailure {
                case_index: submission_run.case_index,
                kind:       FailureKind::Mismatch {
                    expected,
                    actual,
                    diff,
                },
            });
        }
    }

    Verdict {
        submission: name.to_owned(),
        total: base.len(),
        passed,
        failures,
    }
}
