#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # diffgrade
//!
//! Batch autograder CLI: runs every submission against a base solution on
//! the same stdin scripts and diffs whitespace-normalized stdout.
//!
//! The grading engine lives in the library; this binary is the presentation
//! layer. It parses paths, mode and a JSON test-case file, subscribes a
//! console observer (and optionally a report-file transcript) to one
//! grading session, and renders verdicts with score banding.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, bail};
use bpaf::*;
use colored::Colorize;
use diffgrade::{
    discover::{self, Candidate, Mode},
    harness::Runner,
    session::{self, GradingSession, SessionConfig, SessionEvent, SessionObserver, SessionState},
    util,
    verdict::{self, CaseFailure, FailureKind, TestCase, Verdict},
};
use dotenvy::dotenv;
use tabled::{Table, Tabled};
use tracing::{Level, info, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Options shared by the grading commands.
#[derive(Debug, Clone)]
struct GradeArgs {
    /// Path to the base solution.
    base:    PathBuf,
    /// Assignment root containing submissions.
    root:    PathBuf,
    /// Submission layout under the root.
    mode:    Mode,
    /// JSON file holding the test cases.
    cases:   PathBuf,
    /// Optional folder for shared utility modules.
    utility: Option<PathBuf>,
    /// Optional transcript export path.
    report:  Option<PathBuf>,
    /// Whether to print line-level diffs under mismatches.
    details: bool,
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade every submission under the assignment root.
    Grade(GradeArgs),
    /// Grade a single named submission with full detail.
    Check(GradeArgs, String),
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// Parsers for the options shared by both commands.
    fn grade_args() -> impl Parser<GradeArgs> {
        let base = long("base")
            .help("Path to the base solution (a script in file mode, a folder otherwise)")
            .argument::<PathBuf>("PATH");
        let root = long("root")
            .help("Assignment root containing submissions")
            .argument::<PathBuf>("PATH");
        let mode = long("mode")
            .help("Submission layout: file or folder")
            .argument::<Mode>("MODE");
        let cases = long("cases")
            .help("JSON file: an array of test cases, each an array of stdin lines")
            .argument::<PathBuf>("FILE");
        let utility = long("utility")
            .help("Folder appended to each child's module search path")
            .argument::<PathBuf>("PATH")
            .optional();
        let report = long("report")
            .help("Write the full transcript to this file")
            .argument::<PathBuf>("FILE")
            .optional();
        let details = long("details")
            .help("Print line-level diffs under every mismatch")
            .switch();
        construct!(GradeArgs {
            base,
            root,
            mode,
            cases,
            utility,
            report,
            details
        })
    }

    let grade = construct!(Cmd::Grade(grade_args()))
        .to_options()
        .command("grade")
        .help("Grade every submission against the base solution");

    let check = {
        let args = grade_args();
        let name = positional::<String>("SUBMISSION").help("Name of the submission to check");
        construct!(Cmd::Check(args, name))
            .to_options()
            .command("check")
            .help("Grade one submission with full detail")
    };

    construct!([grade, check])
        .to_options()
        .descr("Batch autograder diffing submissions against a base solution")
        .run()
}

/// Loads and validates the JSON test-case file.
fn load_cases(path: &Path) -> Result<Vec<TestCase>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read test-case file {}", path.display()))?;
    let cases: Vec<TestCase> = serde_json::from_str(&raw)
        .with_context(|| format!("Could not parse {} as an array of input-line arrays", path.display()))?;

    if cases.is_empty() {
        bail!("test-case file {} holds no test cases", path.display());
    }
    if let Some(index) = cases.iter().position(TestCase::is_empty) {
        bail!("test case {} has no input lines", index + 1);
    }
    Ok(cases)
}

/// Renders the one-line verdict headline.
fn verdict_line(verdict: &Verdict) -> String {
    format!(
        "{}: {:.1}% ({}/{})",
        verdict.submission,
        verdict.score(),
        verdict.passed,
        verdict.total
    )
}

/// Renders the plain-text block for one scored failure.
fn failure_lines(submission: &str, failure: &CaseFailure, details: bool) -> Vec<String> {
    let test_number = failure.case_index + 1;
    match &failure.kind {
        FailureKind::Runtime { message } => {
            let summary = message.lines().next().unwrap_or("runtime error");
            vec![format!("    Test {test_number}: Runtime error - {summary}")]
        }
        FailureKind::Mismatch {
            expected,
            actual,
            diff,
        } => {
            let mut lines = vec![
                format!("    Test {test_number}: Output mismatch"),
                format!("    --- OUTPUT DIFFERENCES: {submission} - Test {test_number} ---"),
                format!("    Expected: {expected:?}"),
                format!("    Got:      {actual:?}"),
            ];
            if details {
                lines.extend(diff.lines().map(|line| format!("      {line}")));
            }
            lines.push("    --- END DIFFERENCES ---".to_owned());
            lines
        }
    }
}

/// Writes colored per-event lines to stdout as the session progresses.
struct ConsoleObserver {
    /// Whether mismatch blocks include the line-level diff.
    details: bool,
}

impl SessionObserver for ConsoleObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Progress(message) => println!("{}", message.dimmed()),
            SessionEvent::SubmissionGraded(verdict) => {
                let line = verdict_line(verdict);
                let line = if verdict.score() == 100.0 {
                    line.green()
                } else if verdict.score() >= 80.0 {
                    line.yellow()
                } else {
                    line.red()
                };
                println!("{line}");
                for failure in &verdict.failures {
                    for rendered in failure_lines(&verdict.submission, failure, self.details) {
                        println!("{rendered}");
                    }
                }
            }
            SessionEvent::SubmissionFailed { submission, reason } => {
                println!("{}", format!("{submission}: FAILED TO RUN - {reason}").red());
            }
            SessionEvent::Fatal(message) => eprintln!("{}", format!("ERROR: {message}").red().bold()),
            SessionEvent::Finished(state) => {
                println!("{}", format!("=== GRADING {state:?} ===").to_uppercase().bold());
            }
        }
    }
}

/// Buffers a plain-text transcript of every event for later export.
///
/// The saved report is the event stream verbatim; the core persists
/// nothing itself.
#[derive(Default)]
struct Transcript {
    /// Rendered lines, in emission order.
    lines: Mutex<Vec<String>>,
}

impl Transcript {
    /// Writes the buffered transcript to `path`.
    fn save(&self, path: &Path) -> Result<()> {
        let lines = self.lines.lock().expect("transcript lock poisoned");
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(path, content)
            .with_context(|| format!("Could not write report to {}", path.display()))
    }
}

impl SessionObserver for Transcript {
    fn on_event(&self, event: &SessionEvent) {
        let mut lines = self.lines.lock().expect("transcript lock poisoned");
        match event {
            SessionEvent::Progress(message) => lines.push(message.clone()),
            SessionEvent::SubmissionGraded(verdict) => {
                lines.push(verdict_line(verdict));
                for failure in &verdict.failures {
                    lines.extend(failure_lines(&verdict.submission, failure, true));
                }
            }
            SessionEvent::SubmissionFailed { submission, reason } => {
                lines.push(format!("{submission}: FAILED TO RUN - {reason}"));
            }
            SessionEvent::Fatal(message) => lines.push(format!("ERROR: {message}")),
            SessionEvent::Finished(state) => {
                lines.push(format!("=== GRADING {state:?} ===").to_uppercase());
            }
        }
    }
}

/// One row of the final summary table.
#[derive(Tabled)]
struct SummaryRow {
    /// Submission display name.
    #[tabled(rename = "Submission")]
    submission: String,
    /// Score percentage, or a failure marker.
    #[tabled(rename = "Score")]
    score:      String,
    /// Passed-over-total counts.
    #[tabled(rename = "Passed")]
    passed:     String,
}

/// Collects per-submission outcomes for the end-of-run summary table.
#[derive(Default)]
struct Summary {
    /// Accumulated table rows, in grading order.
    rows: Mutex<Vec<SummaryRow>>,
}

impl Summary {
    /// Prints the summary table, if any submission was processed.
    fn print(&self) {
        let rows = self.rows.lock().expect("summary lock poisoned");
        if !rows.is_empty() {
            println!("\n{}", Table::new(rows.iter()));
        }
    }
}

impl SessionObserver for Summary {
    fn on_event(&self, event: &SessionEvent) {
        let mut rows = self.rows.lock().expect("summary lock poisoned");
        match event {
            SessionEvent::SubmissionGraded(verdict) => rows.push(SummaryRow {
                submission: verdict.submission.clone(),
                score:      format!("{:.1}%", verdict.score()),
                passed:     format!("{}/{}", verdict.passed, verdict.total),
            }),
            SessionEvent::SubmissionFailed { submission, .. } => rows.push(SummaryRow {
                submission: submission.clone(),
                score:      "failed to run".to_owned(),
                passed:     "-".to_owned(),
            }),
            _ => {}
        }
    }
}

/// Runs the full batch-grading session.
async fn run_grade(args: GradeArgs) -> Result<()> {
    let cases = load_cases(&args.cases)?;
    let config = SessionConfig::builder()
        .base_path(args.base)
        .assignment_path(args.root)
        .mode(args.mode)
        .test_cases(cases)
        .maybe_utility_path(args.utility)
        .build();

    let mut session = GradingSession::new(config);
    let transcript = Arc::new(Transcript::default());
    let summary = Arc::new(Summary::default());
    session.subscribe(ConsoleObserver {
        details: args.details,
    });
    session.subscribe(Arc::clone(&transcript));
    session.subscribe(Arc::clone(&summary));

    let state = session.run().await?;
    summary.print();

    if let Some(report) = &args.report {
        transcript.save(report)?;
        info!("report saved to {}", report.display());
    }

    if state == SessionState::Failed {
        bail!("grading session failed");
    }
    Ok(())
}

/// Grades exactly one named submission, printing every detail block.
async fn run_check(args: GradeArgs, name: &str) -> Result<()> {
    let cases = load_cases(&args.cases)?;
    let runner = Runner::builder()
        .interpreter(util::python_path()?)
        .maybe_utility_path(args.utility.clone())
        .build();

    let base = discover::resolve_base(&args.base, args.mode)?;
    let submission = discover::resolve_submissions(&args.root, args.mode)?
        .into_iter()
        .find_map(|candidate| match candidate {
            Candidate::Ready(submission) if submission.name == name => Some(submission),
            _ => None,
        })
        .with_context(|| format!("no runnable submission named {name} under {}", args.root.display()))?;

    println!("Testing single submission: {name}");
    println!("{}", "Running base solution...".dimmed());
    let base_runs = session::run_cases(&runner, &base, &cases).await;
    println!("{}", "Running student submission...".dimmed());
    let runs = session::run_cases(&runner, &submission, &cases).await;

    let verdict = verdict::grade_submission(&submission.name, &base_runs, &runs);
    println!("{}", verdict_line(&verdict));
    for failure in &verdict.failures {
        for rendered in failure_lines(&verdict.submission, failure, true) {
            println!("{rendered}");
        }
    }

    if let Some(report) = &args.report {
        let mut lines = vec![verdict_line(&verdict)];
        for failure in &verdict.failures {
            lines.extend(failure_lines(&verdict.submission, failure, true));
        }
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(report, content)
            .with_context(|| format!("Could not write report to {}", report.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    match options() {
        Cmd::Grade(args) => run_grade(args).await,
        Cmd::Check(args, name) => run_check(args, &name).await,
    }
}
