//! Test: Inspection - descriptors and health probes of loaded templates

use crate::helpers::*;
use graphk::TaskRegistry;
use serde_json::json;

const INSPECTED: &str = r#"
id: service
nodes:
  - id: probe
    kind: emit
    values: [1]
    owner: platform
    condition:
      id: enabled
      strategy: any
      checks:
        - { key: enabled, op: truthy }
        - { key: force, op: exists, label: forced }
  - id: route
    next: tail
    branch:
      strategy: best
      seed: 3
      candidates:
        - { id: primary, kind: emit, weight: 2 }
        - { id: fallback, kind: emit, healthy: false }
  - id: tail
    pipeline:
      nodes:
        - { id: flush, kind: emit }
"#;

#[tokio::test]
async fn test_descriptor_tree() {
    let (pipeline, _, _) = load(INSPECTED, &TaskRegistry::with_builtins());
    let tree = serde_json::to_value(pipeline.describe()).unwrap();

    assert_eq!(tree["type"], "pipeline");
    assert_eq!(tree["id"], "service");

    let probe = &tree["nodes"][0];
    assert_eq!(probe["type"], "node");
    assert_eq!(probe["extensions"]["owner"], "platform");
    assert_eq!(probe["info"]["kind"], "emit");
    assert_eq!(
        probe["condition"],
        json!({
            "type": "gate",
            "id": "enabled",
            "strategy": "any",
            "checks": ["enabled truthy", "forced"]
        })
    );

    let route = &tree["nodes"][1];
    assert_eq!(route["type"], "branch");
    assert_eq!(route["strategy"], "best");
    assert_eq!(route["seed"], 3);
    assert_eq!(route["next"], "tail");
    assert_eq!(route["nodes"][0]["weight"], 2);

    assert_eq!(tree["nodes"][2]["nodes"][0]["id"], "flush");
}

#[tokio::test]
async fn test_ping_is_a_conjunction() {
    let (pipeline, _, _) = load(INSPECTED, &TaskRegistry::with_builtins());

    assert!(pipeline.node("probe").unwrap().ping().await);
    assert!(!pipeline.node("route").unwrap().ping().await);
    assert!(!pipeline.ping().await);

    let healthy = INSPECTED.replace("healthy: false", "healthy: true");
    let (pipeline, _, _) = load(&healthy, &TaskRegistry::with_builtins());
    assert!(pipeline.ping().await);
}
