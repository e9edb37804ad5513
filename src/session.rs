#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Grading session orchestration: state machine, events, cancellation.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Result, bail};
use bon::Builder;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    discover::{self, Candidate, Mode, Submission},
    harness::Runner,
    util,
    verdict::{self, CaseRun, TestCase, Verdict},
};

/// Inputs the presentation layer supplies for one grading run.
#[derive(Debug, Clone, Builder)]
#[builder(on(PathBuf, into))]
pub struct SessionConfig {
    /// Reference solution: a script in file mode, a folder otherwise.
    base_path:       PathBuf,
    /// Assignment root holding the submissions.
    assignment_path: PathBuf,
    /// Submission layout under the assignment root.
    mode:            Mode,
    /// Ordered stdin scripts; every party runs all of them in order.
    test_cases:      Vec<TestCase>,
    /// Optional folder appended to each child's module search path.
    utility_path:    Option<PathBuf>,
}

/// Lifecycle of a grading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Constructed, not yet started.
    Idle,
    /// The worker is grading.
    Running,
    /// Every submission was processed.
    Completed,
    /// Cancelled between submissions; processed results were retained.
    Stopped,
    /// A fatal condition aborted the whole session.
    Failed,
}

/// Typed events the session emits while running.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Free-text status line.
    Progress(String),
    /// A submission was graded to completion.
    SubmissionGraded(Verdict),
    /// A submission could not be run at all.
    SubmissionFailed {
        /// Display name of the submission.
        submission: String,
        /// Why it could not be graded.
        reason:     String,
    },
    /// A fatal condition aborted the session.
    Fatal(String),
    /// The session reached a terminal state.
    Finished(SessionState),
}

/// Receives every session event, in emission order.
///
/// Any number of observers subscribe independently; sequential execution
/// guarantees they see events in completion order.
pub trait SessionObserver: Send + Sync {
    /// Called for each event as it is emitted.
    fn on_event(&self, event: &SessionEvent);
}

impl<T: SessionObserver + ?Sized> SessionObserver for Arc<T> {
    fn on_event(&self, event: &SessionEvent) {
        (**self).on_event(event);
    }
}

/// Cooperative cancellation handle for a session.
///
/// Checked only between submissions: an in-flight process either finishes
/// normally or is killed by the harness's own deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Requests that the session stop before the next submission.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs one grading session sequentially: the base solution against every
/// test case, then each submission in order against the same cases.
pub struct GradingSession {
    /// Immutable inputs for this run.
    config:    SessionConfig,
    /// Current lifecycle state.
    state:     SessionState,
    /// Cancellation flag, shared with handles cloned out of the session.
    cancel:    CancelHandle,
    /// Subscribed observers, notified in registration order.
    observers: Vec<Box<dyn SessionObserver>>,
}

impl GradingSession {
    /// Creates an idle session over the given configuration.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            cancel: CancelHandle::default(),
            observers: Vec::new(),
        }
    }

    /// Registers an observer for all subsequent events.
    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Returns a cancellation handle usable from any thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to a terminal state.
    ///
    /// Start preconditions (existing paths, non-empty test cases) are
    /// rejected with an error before any state transition. After the
    /// session is running, every fatal condition is caught at this
    /// boundary and surfaced as a `Fatal` event plus the `Failed` state,
    /// never as a panic or an `Err`.
    pub async fn run(&mut self) -> Result<SessionState> {
        self.reject_bad_start()?;

        self.state = SessionState::Running;
        info!(mode = %self.config.mode, "grading session started");

        match self.drive().await {
            Ok(final_state) => {
                self.state = final_state;
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "grading session failed");
                self.state = SessionState::Failed;
                self.emit(&SessionEvent::Fatal(format!("{err:#}")));
            }
        }

        self.emit(&SessionEvent::Finished(self.state));
        Ok(self.state)
    }

    /// Validates start preconditions without transitioning state.
    fn reject_bad_start(&self) -> Result<()> {
        if self.state != SessionState::Idle {
            bail!("session already ran");
        }
        if !self.config.base_path.exists() {
            bail!(
                "base solution path {} does not exist",
                self.config.base_path.display()
            );
        }
        if !self.config.assignment_path.exists() {
            bail!(
                "assignment path {} does not exist",
                self.config.assignment_path.display()
            );
        }
        if self.config.test_cases.is_empty() {
            bail!("at least one test case is required");
        }
        Ok(())
    }

    /// The sequential worker: base first, then each submission.
    async fn drive(&self) -> Result<SessionState> {
        let runner = Runner::builder()
            .interpreter(util::python_path()?)
            .maybe_utility_path(self.config.utility_path.clone())
            .build();

        self.emit(&SessionEvent::Progress("Running base solution...".to_owned()));
        let base = discover::resolve_base(&self.config.base_path, self.config.mode)?;
        let base_runs = run_cases(&runner, &base, &self.config.test_cases).await;
        info!(cases = base_runs.len(), base = %base.name, "base solution finished");

        let candidates = discover::resolve_submissions(&self.config.assignment_path, self.config.mode)?;
        let total = candidates.len();

        for (index, candidate) in candidates.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(processed = index, total, "session cancelled between submissions");
                self.emit(&SessionEvent::Progress("Stopped".to_owned()));
                return Ok(SessionState::Stopped);
            }

            match candidate {
                Candidate::Unusable { name, reason } => {
                    warn!(submission = %name, %reason, "submission cannot be graded");
                    self.emit(&SessionEvent::SubmissionFailed {
                        submission: name.clone(),
                        reason:     reason.to_string(),
                    });
                }
                Candidate::Ready(submission) => {
                    self.emit(&SessionEvent::Progress(format!(
                        "Grading {} ({}/{})...",
                        submission.name,
                        index + 1,
                        total
                    )));
                    let runs = run_cases(&runner, submission, &self.config.test_cases).await;
                    let verdict = verdict::grade_submission(&submission.name, &base_runs, &runs);
                    info!(
                        submission = %verdict.submission,
                        passed = verdict.passed,
                        total = verdict.total,
                        "submission graded"
                    );
                    self.emit(&SessionEvent::SubmissionGraded(verdict));
                }
            }
        }

        self.emit(&SessionEvent::Progress("Completed".to_owned()));
        Ok(SessionState::Completed)
    }

    /// Delivers one event to every observer, in registration order.
    fn emit(&self, event: &SessionEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Runs every test case, in order, against one submission.
///
/// Per-case failures are carried as values in the returned runs; they never
/// abort the remaining cases. Exactly one process is spawned per case.
pub async fn run_cases(runner: &Runner, submission: &Submission, cases: &[TestCase]) -> Vec<CaseRun> {
    let mut runs = Vec::with_capacity(cases.len());
    for (case_index, case) in cases.iter().enumerate() {
        let outcome = runner
            .run_case(&submission.main_script, &submission.root, case.lines())
            .await;
        runs.push(CaseRun {
            case_index,
            input: case.lines().to_vec(),
            outcome,
        });
    }
    runs
}
