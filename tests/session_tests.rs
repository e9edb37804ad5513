//! End-to-end grading session tests over generated fixture trees.
//!
//! Fixtures are real Python scripts in temp directories; tests that need an
//! interpreter skip themselves when none is available.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
    time::SystemTime,
};

use diffgrade::{
    discover::Mode,
    session::{CancelHandle, GradingSession, SessionConfig, SessionEvent, SessionObserver, SessionState},
    verdict::{FailureKind, TestCase, Verdict},
};

fn temp_root(tag: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("diffgrade_session_{tag}_{nonce}"));
    fs::create_dir_all(&dir).expect("create temp root");
    dir
}

fn write_script(dir: &Path, name: &str, body: &str) {
    fs::create_dir_all(dir).expect("create fixture dir");
    fs::write(dir.join(name), body).expect("write script");
}

fn python_available() -> bool {
    diffgrade::util::python_path().is_ok()
}

/// Records every event the session emits, in order.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<SessionEvent>>,
}

impl Recorder {
    fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().expect("recorder lock poisoned").clone()
    }

    fn verdicts(&self) -> Vec<Verdict> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::SubmissionGraded(verdict) => Some(verdict),
                _ => None,
            })
            .collect()
    }
}

impl SessionObserver for Recorder {
    fn on_event(&self, event: &SessionEvent) {
        self.events
            .lock()
            .expect("recorder lock poisoned")
            .push(event.clone());
    }
}

/// Cancels the session as soon as the first verdict lands.
struct CancelAfterFirst {
    handle: CancelHandle,
}

impl SessionObserver for CancelAfterFirst {
    fn on_event(&self, event: &SessionEvent) {
        if matches!(event, SessionEvent::SubmissionGraded(_)) {
            self.handle.cancel();
        }
    }
}

fn config(base: &Path, root: &Path, mode: Mode, cases: Vec<TestCase>) -> SessionConfig {
    SessionConfig::builder()
        .base_path(base.to_path_buf())
        .assignment_path(root.to_path_buf())
        .mode(mode)
        .test_cases(cases)
        .build()
}

#[tokio::test]
async fn whitespace_differences_still_score_full_marks() {
    if !python_available() {
        eprintln!("skipping: no python interpreter available");
        return;
    }
    let fixture = temp_root("whitespace");
    let base = fixture.join("base");
    write_script(&base, "main.py", "print('Result: 3.5')\nprint('5')\n");
    let root = fixture.join("submissions");
    write_script(
        &root.join("alice"),
        "main.py",
        "print('Result:   3.5  ')\nprint(' 5')\nprint()\n",
    );

    let recorder = std::sync::Arc::new(Recorder::default());
    let mut session = GradingSession::new(config(
        &base,
        &root,
        Mode::Folder,
        vec![TestCase::new(["unused"])],
    ));
    session.subscribe(std::sync::Arc::clone(&recorder));

    let state = session.run().await.expect("session starts");
    assert_eq!(state, SessionState::Completed);

    let verdicts = recorder.verdicts();
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].submission, "alice");
    assert_eq!(verdicts[0].passed, 1);
    assert_eq!(verdicts[0].total, 1);
    assert_eq!(verdicts[0].score(), 100.0);

    let _ = fs::remove_dir_all(fixture);
}

#[tokio::test]
async fn reordered_output_is_a_mismatch() {
    if !python_available() {
        eprintln!("skipping: no python interpreter available");
        return;
    }
    let fixture = temp_root("reorder");
    let base = fixture.join("base");
    write_script(&base, "main.py", "print('A')\nprint('B')\n");
    let root = fixture.join("submissions");
    write_script(&root.join("bob"), "main.py", "print('B')\nprint('A')\n");

    let recorder = std::sync::Arc::new(Recorder::default());
    let mut session = GradingSession::new(config(
        &base,
        &root,
        Mode::Folder,
        vec![TestCase::new(["unused"])],
    ));
    session.subscribe(std::sync::Arc::clone(&recorder));

    let state = session.run().await.expect("session starts");
    assert_eq!(state, SessionState::Completed);

    let verdicts = recorder.verdicts();
    assert_eq!(verdicts[0].passed, 0);
    assert_eq!(verdicts[0].failures.len(), 1);
    assert!(matches!(
        verdicts[0].failures[0].kind,
        FailureKind::Mismatch { .. }
    ));

    let _ = fs::remove_dir_all(fixture);
}

#[tokio::test]
async fn runtime_error_on_one_case_scores_two_of_three() {
    if !python_available() {
        eprintln!("skipping: no python interpreter available");
        return;
    }
    let fixture = temp_root("partial");
    let base = fixture.join("base.py");
    fs::write(&base, "s = input()\nprint(s)\n").expect("write base");
    let root = fixture.join("submissions");
    write_script(&root, "carol.py", "s = input()\nprint(int(s))\n");

    let recorder = std::sync::Arc::new(Recorder::default());
    let mut session = GradingSession::new(config(
        &base,
        &root,
        Mode::File,
        vec![
            TestCase::new(["1"]),
            TestCase::new(["2"]),
            TestCase::new(["boom"]),
        ],
    ));
    session.subscribe(std::sync::Arc::clone(&recorder));

    let state = session.run().await.expect("session starts");
    assert_eq!(state, SessionState::Completed);

    let verdicts = recorder.verdicts();
    assert_eq!(verdicts.len(), 1);
    let verdict = &verdicts[0];
    assert_eq!(verdict.submission, "carol.py");
    assert_eq!(verdict.passed, 2);
    assert_eq!(verdict.total, 3);
    assert!((verdict.score() - 100.0 * 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(verdict.failures.len(), 1);
    assert_eq!(verdict.failures[0].case_index, 2);
    assert!(matches!(verdict.failures[0].kind, FailureKind::Runtime { .. }));

    let _ = fs::remove_dir_all(fixture);
}

#[tokio::test]
async fn cancelling_after_the_first_verdict_stops_the_session() {
    if !python_available() {
        eprintln!("skipping: no python interpreter available");
        return;
    }
    let fixture = temp_root("cancel");
    let base = fixture.join("base");
    write_script(&base, "main.py", "print('ok')\n");
    let root = fixture.join("submissions");
    for name in ["alice", "bob", "carla"] {
        write_script(&root.join(name), "main.py", "print('ok')\n");
    }

    let recorder = std::sync::Arc::new(Recorder::default());
    let mut session = GradingSession::new(config(
        &base,
        &root,
        Mode::Folder,
        vec![TestCase::new(["unused"])],
    ));
    let canceller = CancelAfterFirst {
        handle: session.cancel_handle(),
    };
    session.subscribe(std::sync::Arc::clone(&recorder));
    session.subscribe(canceller);

    let state = session.run().await.expect("session starts");
    assert_eq!(state, SessionState::Stopped);
    assert_eq!(recorder.verdicts().len(), 1);

    let finished: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|event| matches!(event, SessionEvent::Finished(SessionState::Stopped)))
        .collect();
    assert_eq!(finished.len(), 1);

    let _ = fs::remove_dir_all(fixture);
}

#[tokio::test]
async fn folder_without_scripts_is_reported_and_grading_continues() {
    if !python_available() {
        eprintln!("skipping: no python interpreter available");
        return;
    }
    let fixture = temp_root("unusable");
    let base = fixture.join("base");
    write_script(&base, "main.py", "print('ok')\n");
    let root = fixture.join("submissions");
    write_script(&root.join("alice"), "main.py", "print('ok')\n");
    fs::create_dir_all(root.join("empty")).expect("create empty folder");
    fs::write(root.join("empty").join("notes.txt"), "no scripts here").expect("write notes");

    let recorder = std::sync::Arc::new(Recorder::default());
    let mut session = GradingSession::new(config(
        &base,
        &root,
        Mode::Folder,
        vec![TestCase::new(["unused"])],
    ));
    session.subscribe(std::sync::Arc::clone(&recorder));

    let state = session.run().await.expect("session starts");
    assert_eq!(state, SessionState::Completed);

    let failed: Vec<_> = recorder
        .events()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::SubmissionFailed { submission, reason } => Some((submission, reason)),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "empty");
    assert!(failed[0].1.contains("no .py scripts"));
    assert_eq!(recorder.verdicts().len(), 1);

    let _ = fs::remove_dir_all(fixture);
}

#[tokio::test]
async fn empty_test_case_list_is_rejected_before_start() {
    let fixture = temp_root("no_cases");
    let base = fixture.join("base.py");
    fs::write(&base, "print('ok')\n").expect("write base");
    let root = fixture.join("submissions");
    fs::create_dir_all(&root).expect("create root");

    let mut session = GradingSession::new(config(&base, &root, Mode::File, vec![]));
    let err = session.run().await.expect_err("must be rejected");
    assert!(err.to_string().contains("at least one test case"));
    assert_eq!(session.state(), SessionState::Idle);

    let _ = fs::remove_dir_all(fixture);
}

#[tokio::test]
async fn missing_base_path_is_rejected_before_start() {
    let fixture = temp_root("no_base");
    let root = fixture.join("submissions");
    fs::create_dir_all(&root).expect("create root");

    let mut session = GradingSession::new(config(
        &fixture.join("missing.py"),
        &root,
        Mode::File,
        vec![TestCase::new(["x"])],
    ));
    let err = session.run().await.expect_err("must be rejected");
    assert!(err.to_string().contains("does not exist"));
    assert_eq!(session.state(), SessionState::Idle);

    let _ = fs::remove_dir_all(fixture);
}

#[tokio::test]
async fn unresolvable_base_folder_fails_the_session() {
    let fixture = temp_root("bad_base");
    let base = fixture.join("base");
    fs::create_dir_all(&base).expect("create base folder");
    let root = fixture.join("submissions");
    write_script(&root.join("alice"), "main.py", "print('ok')\n");

    let recorder = std::sync::Arc::new(Recorder::default());
    let mut session = GradingSession::new(config(
        &base,
        &root,
        Mode::Folder,
        vec![TestCase::new(["x"])],
    ));
    session.subscribe(std::sync::Arc::clone(&recorder));

    let state = session.run().await.expect("start preconditions hold");
    assert_eq!(state, SessionState::Failed);
    assert!(recorder
        .events()
        .iter()
        .any(|event| matches!(event, SessionEvent::Fatal(_))));
    assert!(recorder.verdicts().is_empty());

    let _ = fs::remove_dir_all(fixture);
}

#[tokio::test]
async fn assignment_root_with_no_candidates_fails_the_session() {
    let fixture = temp_root("no_candidates");
    let base = fixture.join("base");
    write_script(&base, "main.py", "print('ok')\n");
    let root = fixture.join("submissions");
    fs::create_dir_all(&root).expect("create root");

    let recorder = std::sync::Arc::new(Recorder::default());
    let mut session = GradingSession::new(config(
        &base,
        &root,
        Mode::Folder,
        vec![TestCase::new(["x"])],
    ));
    session.subscribe(std::sync::Arc::clone(&recorder));

    let state = session.run().await.expect("start preconditions hold");
    assert_eq!(state, SessionState::Failed);
    assert!(recorder
        .events()
        .iter()
        .any(|event| matches!(event, SessionEvent::Fatal(_))));

    let _ = fs::remove_dir_all(fixture);
}
