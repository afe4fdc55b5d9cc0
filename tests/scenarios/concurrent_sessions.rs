//! Test: Concurrent Sessions - one template, many isolated runs

use crate::helpers::*;
use graphk::core::SessionStatus;
use graphk::{Context, TaskRegistry};
use serde_json::json;

const TEMPLATE: &str = r#"
id: shared
nodes:
  - id: route
    branch:
      candidates:
        - id: even
          kind: emit
          values: ["even"]
          condition:
            checks: [{ key: parity, op: equals, value: 0 }]
        - { id: odd, kind: emit, values: ["odd"] }
  - { id: finish, kind: emit, values: ["finished"] }
"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sessions_on_shared_template_do_not_interfere() {
    let (pipeline, runner, _) = load(TEMPLATE, &TaskRegistry::with_builtins());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let runner = runner.clone();
            let mut session =
                runner.start(pipeline.clone(), Context::new().with("parity", i % 2));
            tokio::spawn(async move {
                let status = runner.run(&mut session).await.unwrap();
                (i, status, session)
            })
        })
        .collect();

    for handle in handles {
        let (i, status, session) = handle.await.unwrap();
        assert_eq!(status, SessionStatus::Completed);

        let expected = if i % 2 == 0 { "route/even" } else { "route/odd" };
        assert_eq!(logged(&session), vec![expected, "finish"]);
        assert_eq!(session.context().get("parity"), Some(&json!(i % 2)));
    }
}

#[tokio::test]
async fn test_interleaved_sessions_progress_independently() {
    let (pipeline, runner, _) = load(TEMPLATE, &TaskRegistry::with_builtins());

    let mut first = runner.start(pipeline.clone(), Context::new().with("parity", 0));
    let mut second = runner.start(pipeline.clone(), Context::new().with("parity", 1));

    // Interleave the two sessions step by step
    runner.step(&mut first).await.unwrap();
    runner.step(&mut second).await.unwrap();
    first.pause();
    runner.run(&mut second).await.unwrap();
    assert_eq!(first.status(), SessionStatus::Running);
    assert_eq!(second.status(), SessionStatus::Completed);

    first.start();
    runner.run(&mut first).await.unwrap();
    assert_eq!(logged(&first), vec!["route/even", "finish"]);
    assert_ne!(first.id(), second.id());
}
