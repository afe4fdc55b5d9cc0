//! Test: Pause and Resume - cooperative pausing at step boundaries

use crate::helpers::*;
use graphk::core::SessionStatus;
use graphk::execution::{Runner, RunnerEvent, SessionControl, StepOutcome};
use graphk::TaskRegistry;
use std::sync::{Arc, Mutex};

const CHAIN: &str = r#"
id: chain
nodes:
  - { id: one, kind: emit, values: [1] }
  - { id: two, kind: emit, values: [2] }
  - { id: three, kind: emit, values: [3] }
"#;

#[tokio::test]
async fn test_pause_requested_from_event_handler() {
    let (pipeline, runner, context) = load(CHAIN, &TaskRegistry::with_builtins());
    let control: Arc<Mutex<Option<SessionControl>>> = Arc::new(Mutex::new(None));
    let handle = control.clone();
    let runner = Runner::new(runner.config().clone()).with_event_handler(move |event| {
        if let RunnerEvent::NodeCompleted { node, .. } = event {
            if node == "one" {
                if let Some(control) = handle.lock().unwrap().as_ref() {
                    control.pause();
                }
            }
        }
    });

    let mut session = runner.start(pipeline, context);
    *control.lock().unwrap() = Some(session.control());

    let status = runner.run(&mut session).await.unwrap();
    assert_eq!(status, SessionStatus::Paused);
    assert_eq!(logged(&session), vec!["one"]);
    assert!(!session.is_running());

    session.start();
    let status = runner.run(&mut session).await.unwrap();
    assert_eq!(status, SessionStatus::Completed);
    assert_eq!(logged(&session), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_paused_session_stays_paused_until_started() {
    let (pipeline, runner, context) = load(CHAIN, &TaskRegistry::with_builtins());
    let mut session = runner.start(pipeline, context);

    session.pause();
    assert_eq!(runner.step(&mut session).await.unwrap(), StepOutcome::Paused);
    assert_eq!(session.status(), SessionStatus::Paused);
    assert_eq!(runner.step(&mut session).await.unwrap(), StepOutcome::Paused);
    assert!(session.log().is_empty());

    session.start();
    assert!(matches!(
        runner.step(&mut session).await.unwrap(),
        StepOutcome::Executed { .. }
    ));
    assert!(session.is_running());
}

#[tokio::test]
async fn test_snapshot_tracks_cursor_while_paused() {
    let (pipeline, runner, context) = load(CHAIN, &TaskRegistry::with_builtins());
    let mut session = runner.start(pipeline, context);
    runner.step(&mut session).await.unwrap();
    session.pause();
    runner.run(&mut session).await.unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Paused);
    assert_eq!(snapshot.current_node.as_deref(), Some("two"));
    assert_eq!(snapshot.cursor, Some(vec![1]));
    assert_eq!(snapshot.log.len(), 1);
}
