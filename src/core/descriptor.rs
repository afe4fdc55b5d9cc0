//! Inspection descriptors - serializable, acyclic views of templates

use crate::core::{
    branch::BranchNode,
    context::{Context, Extensions},
    gate::Gate,
    node::{LeafNode, Node},
    pipeline::Pipeline,
};
use serde::Serialize;
use serde_json::Value;

/// Summary of a gate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateDescriptor {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub strategy: String,
    pub checks: Vec<String>,
}

impl From<&Gate> for GateDescriptor {
    fn from(gate: &Gate) -> Self {
        Self {
            kind: "gate",
            id: gate.id().map(str::to_string),
            strategy: gate.strategy().name().to_string(),
            checks: gate.labels().map(str::to_string).collect(),
        }
    }
}

/// Tree-shaped description of a node, branch or pipeline
///
/// Successors appear by id only, so the tree stays acyclic and diffable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<GateDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<GateDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Context::is_empty")]
    pub context: Context,
    #[serde(skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Descriptor>,
}

impl Descriptor {
    fn base(kind: &'static str, node_attrs: &crate::core::node::NodeAttrs) -> Self {
        Self {
            kind,
            id: node_attrs.id.clone(),
            strategy: None,
            seed: None,
            weight: node_attrs.weight,
            condition: node_attrs.condition.as_ref().map(GateDescriptor::from),
            validation: None,
            next: node_attrs.next.clone(),
            context: node_attrs.context.as_ref().clone(),
            extensions: node_attrs.extensions.clone(),
            info: None,
            nodes: Vec::new(),
        }
    }

    pub(crate) fn for_leaf(leaf: &LeafNode) -> Self {
        let mut descriptor = Self::base("node", &leaf.attrs);
        descriptor.validation = leaf.validation().map(GateDescriptor::from);
        descriptor.info = Some(leaf.task().info());
        descriptor
    }

    pub(crate) fn for_branch(branch: &BranchNode) -> Self {
        let mut descriptor = Self::base("branch", &branch.attrs);
        descriptor.strategy = Some(
            serde_json::to_value(branch.strategy())
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
        );
        descriptor.seed = branch.seed();
        descriptor.nodes = branch.candidates().iter().map(Node::describe).collect();
        descriptor
    }

    pub(crate) fn for_pipeline(pipeline: &Pipeline) -> Self {
        let mut descriptor = Self::base("pipeline", &pipeline.attrs);
        descriptor.nodes = pipeline.nodes().iter().map(Node::describe).collect();
        descriptor
    }

    /// Pretty JSON rendering
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
