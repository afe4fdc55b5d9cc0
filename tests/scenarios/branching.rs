//! Test: Branching - selection strategies, dead ends and branch successors

use crate::helpers::*;
use graphk::core::{ErrorKind, NodeState};
use graphk::execution::RunnerEvent;
use graphk::Context;
use serde_json::json;

fn routed(strategy: &str) -> String {
    format!(
        r#"
id: router
nodes:
  - id: route
    branch:
      strategy: {}
      candidates:
        - {{ id: low, kind: emit, values: ["low"], weight: 1 }}
        - id: gated
          kind: emit
          values: ["gated"]
          weight: 10
          condition:
            checks: [{{ key: premium, op: truthy }}]
        - {{ id: high, kind: emit, values: ["high"], weight: 5 }}
        - {{ id: tie, kind: emit, values: ["tie"], weight: 5 }}
  - {{ id: after, kind: emit, values: ["after"] }}
"#,
        strategy
    )
}

#[tokio::test]
async fn test_first_strategy_takes_first_valid() {
    let run = run_yaml(&routed("first")).await;
    assert_completed(&run, &["route/low", "after"]);
    assert!(run.events.contains(&RunnerEvent::BranchSelected {
        branch: "route".to_string(),
        selected: "low".to_string(),
    }));
}

#[tokio::test]
async fn test_best_strategy_prefers_weight_then_order() {
    let run = run_yaml(&routed("best")).await;
    assert_completed(&run, &["route/high", "after"]);

    let registry = graphk::TaskRegistry::with_builtins();
    let run = run_yaml_with(&routed("best"), &registry, Context::new().with("premium", true)).await;
    assert_completed(&run, &["route/gated", "after"]);
}

#[tokio::test]
async fn test_branch_is_not_logged_but_marked_done() {
    let run = run_yaml(&routed("first")).await;
    assert!(run.session.log().iter().all(|e| e.node_id != "route"));
    assert!(matches!(run.session.node_state("route"), NodeState::Done { .. }));
}

#[tokio::test]
async fn test_dead_end_fails_session_without_error() {
    let yaml = r#"
id: stuck
nodes:
  - { id: first, kind: emit, values: [1] }
  - id: route
    branch:
      candidates:
        - id: only
          kind: emit
          condition:
            checks: [{ key: approved, op: exists }]
  - { id: never, kind: emit, values: [2] }
"#;

    let run = run_yaml_with(
        yaml,
        &graphk::TaskRegistry::with_builtins(),
        Context::new().with("ticket", "T-1"),
    )
    .await;

    assert!(run.result.is_ok());
    assert_failed(&run, ErrorKind::DeadEnd, "route");
    assert_eq!(run.logged(), vec!["first"]);
    let failure = run.session.failure().unwrap();
    assert_eq!(failure.context.get("ticket"), Some(&json!("T-1")));
    assert_eq!(run.session.node_state("never"), NodeState::Pending);
}

#[tokio::test]
async fn test_candidate_next_overrides_branch_next() {
    let yaml = r#"
id: successors
nodes:
  - id: route
    next: c
    branch:
      strategy: best
      candidates:
        - { id: jump, kind: emit, values: ["jump"], weight: 2, next: b }
        - { id: plain, kind: emit, values: ["plain"] }
  - { id: a, kind: emit, values: ["a"] }
  - { id: b, kind: emit, values: ["b"] }
  - { id: c, kind: emit, values: ["c"] }
"#;
    let run = run_yaml(yaml).await;
    assert_completed(&run, &["route/jump", "b", "c"]);
}

#[tokio::test]
async fn test_branch_next_applies_to_plain_candidate() {
    let yaml = r#"
id: successors
nodes:
  - id: route
    next: c
    branch:
      candidates:
        - { id: plain, kind: emit, values: ["plain"] }
  - { id: a, kind: emit, values: ["a"] }
  - { id: c, kind: emit, values: ["c"] }
"#;
    let run = run_yaml(yaml).await;
    assert_completed(&run, &["route/plain", "c"]);
}

#[tokio::test]
async fn test_seeded_random_selection_is_reproducible() {
    let candidates: String = (0..8)
        .map(|i| format!("        - {{ id: c{}, kind: emit, values: [{}] }}\n", i, i))
        .collect();
    let yaml = format!(
        "id: dice\nrunner:\n  seed: 1234\nnodes:\n  - id: roll\n    branch:\n      strategy: random\n      candidates:\n{}",
        candidates
    );

    let first = run_yaml(&yaml).await;
    let second = run_yaml(&yaml).await;

    assert_eq!(first.logged().len(), 1);
    assert_eq!(first.logged(), second.logged());
}

#[tokio::test]
async fn test_branch_seed_fixes_selection() {
    let yaml = r#"
id: dice
nodes:
  - id: roll
    branch:
      strategy: random
      seed: 99
      candidates:
        - { id: a, kind: emit }
        - { id: b, kind: emit }
        - { id: c, kind: emit }
        - { id: d, kind: emit }
"#;
    let mut picks = Vec::new();
    for _ in 0..5 {
        picks.push(run_yaml(yaml).await.logged());
    }
    assert!(picks.windows(2).all(|w| w[0] == w[1]));
}
