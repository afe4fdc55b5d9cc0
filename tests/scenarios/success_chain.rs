//! Test: Success Chain - linear traversal and published outputs

use crate::helpers::*;
use graphk::core::{NodeState, SessionStatus};
use serde_json::json;

#[tokio::test]
async fn test_success_chain() {
    let yaml = r#"
id: release
nodes:
  - { id: plan, kind: emit, values: ["planned"] }
  - { id: build, kind: emit, values: ["compiling", "built"] }
  - { id: ship, kind: emit, values: ["shipped"] }
"#;

    let run = run_yaml(yaml).await;

    assert_completed(&run, &["plan", "build", "ship"]);
    assert_eq!(run.entry("build").result, json!("built"));
    assert_eq!(run.entry("build").outputs, vec![json!("compiling"), json!("built")]);
    for node in ["plan", "build", "ship"] {
        assert_eq!(attempts(&run.session, node), 1);
    }
    assert!(run.session.failure().is_none());
}

#[tokio::test]
async fn test_long_chain_logs_every_node_once() {
    let nodes: String = (1..=8)
        .map(|i| format!("  - {{ id: step{}, kind: emit, values: [{}] }}\n", i, i))
        .collect();
    let yaml = format!("id: long\nnodes:\n{}", nodes);

    let run = run_yaml(&yaml).await;

    let expected: Vec<String> = (1..=8).map(|i| format!("step{}", i)).collect();
    assert_eq!(run.logged(), expected);
    assert_eq!(run.session.status(), SessionStatus::Completed);
    assert_eq!(run.session.log()[7].result, json!(8));
}

#[tokio::test]
async fn test_node_without_output_logs_null() {
    let run = run_yaml("id: quiet\nnodes:\n  - { id: noop, kind: emit }\n").await;

    assert_completed(&run, &["noop"]);
    assert_eq!(run.entry("noop").result, json!(null));
    assert!(run.entry("noop").outputs.is_empty());
}

#[tokio::test]
async fn test_outputs_feed_later_conditions() {
    let yaml = r#"
id: gated
nodes:
  - { id: check, kind: emit, values: ["green"] }
  - id: deploy
    kind: emit
    values: ["deployed"]
    condition:
      checks:
        - { key: steps.check.output, op: equals, value: "green" }
  - id: rollback
    kind: emit
    values: ["rolled back"]
    condition:
      checks:
        - { key: steps.check.output, op: equals, value: "red" }
"#;

    let run = run_yaml(yaml).await;

    assert_completed(&run, &["check", "deploy"]);
    assert!(matches!(
        run.session.node_state("rollback"),
        NodeState::Skipped { .. }
    ));
    assert_eq!(
        run.session.context().output("deploy"),
        Some(&json!("deployed"))
    );
}

#[tokio::test]
async fn test_next_jumps_over_members() {
    let yaml = r#"
id: jumps
nodes:
  - { id: start, kind: emit, values: [1], next: finish }
  - { id: skipped, kind: emit, values: [2] }
  - { id: finish, kind: emit, values: [3] }
"#;

    let run = run_yaml(yaml).await;

    assert_completed(&run, &["start", "finish"]);
    assert_eq!(run.session.node_state("skipped"), NodeState::Pending);
}

#[tokio::test]
async fn test_static_context_is_overlaid_by_run_context() {
    let task = ScriptedTask::new(vec![Script::ok(vec![json!("ok")])]);
    let registry = registry_with(vec![("probe", task.clone())]);
    let yaml = r#"
id: ctx
context:
  region: eu
nodes:
  - id: probe
    kind: scripted
    script: probe
    context:
      region: us
      retries: 2
"#;

    let run = run_yaml_with(yaml, &registry, graphk::Context::new()).await;

    assert_completed(&run, &["probe"]);
    let seen = task.seen();
    assert_eq!(seen.len(), 1);
    // Per-run values win over the node's static ones
    assert_eq!(seen[0].get("region"), Some(&json!("eu")));
    assert_eq!(seen[0].get("retries"), Some(&json!(2)));
}
