//! Pipeline configuration from YAML

use crate::core::{
    branch::{BranchNode, SelectionStrategy},
    context::{Context, Extensions},
    error::PredicateError,
    gate::{Gate, GateStrategy},
    node::{LeafNode, Node},
    pipeline::Pipeline,
};
use crate::execution::RunnerConfig;
use crate::tasks::TaskRegistry;
use anyhow::{Context as _, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline identifier
    pub id: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Initial per-run context for sessions started from this file
    #[serde(default)]
    pub context: Extensions,

    /// Runner defaults
    #[serde(default)]
    pub runner: RunnerSettings,

    /// Pipeline members, in traversal order
    pub nodes: Vec<NodeConfig>,
}

/// Runner settings as written in YAML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSettings {
    #[serde(default)]
    pub max_retries: Option<usize>,

    /// Limit for one leaf's step sequence, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub seed: Option<u64>,
}

/// A pipeline member, branch candidate or nested pipeline member
///
/// Exactly one of `kind`, `branch` or `pipeline` must be set. Keys not listed
/// here are kept as extension attributes and handed to the task factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,

    /// Task kind of a leaf, resolved through the [`TaskRegistry`]
    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub branch: Option<BranchConfig>,

    #[serde(default)]
    pub pipeline: Option<NestedPipelineConfig>,

    /// Static context of the node
    #[serde(default)]
    pub context: Extensions,

    #[serde(default)]
    pub condition: Option<GateConfig>,

    /// Only valid on leaves
    #[serde(default)]
    pub validation: Option<GateConfig>,

    #[serde(default)]
    pub weight: Option<i64>,

    /// Id of the member of the owning pipeline to continue with
    #[serde(default)]
    pub next: Option<String>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    #[serde(default)]
    pub strategy: SelectionStrategy,

    #[serde(default)]
    pub seed: Option<u64>,

    pub candidates: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedPipelineConfig {
    pub nodes: Vec<NodeConfig>,
}

/// Gate declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub strategy: GateStrategy,

    #[serde(default)]
    pub checks: Vec<PredicateConfig>,
}

/// One predicate over a context key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredicateConfig {
    pub key: String,

    pub op: PredicateOp,

    /// Operand for `equals`, `not_equals`, `gt`, `lt` and `matches`
    #[serde(default)]
    pub value: Option<Value>,

    /// Label shown when inspecting the gate; derived from the check when absent
    #[serde(default)]
    pub label: Option<String>,
}

/// Built-in predicate vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOp {
    Exists,
    Missing,
    Equals,
    NotEquals,
    Truthy,
    Gt,
    Lt,
    Matches,
}

impl PredicateOp {
    fn name(&self) -> &'static str {
        match self {
            PredicateOp::Exists => "exists",
            PredicateOp::Missing => "missing",
            PredicateOp::Equals => "equals",
            PredicateOp::NotEquals => "not_equals",
            PredicateOp::Truthy => "truthy",
            PredicateOp::Gt => "gt",
            PredicateOp::Lt => "lt",
            PredicateOp::Matches => "matches",
        }
    }

    fn needs_operand(&self) -> bool {
        !matches!(
            self,
            PredicateOp::Exists | PredicateOp::Missing | PredicateOp::Truthy
        )
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the shape of every node declaration
    ///
    /// Graph rules (unique ids, `next` targets, cycles) are checked when the
    /// pipeline is built.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("Pipeline id must not be empty");
        }
        for node in &self.nodes {
            node.validate()?;
        }
        Ok(())
    }

    /// Runner configuration from the `runner` section
    pub fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::default();
        if let Some(max_retries) = self.runner.max_retries {
            config = config.with_max_retries(max_retries);
        }
        if let Some(secs) = self.runner.timeout_secs {
            config = config.with_step_timeout(Duration::from_secs(secs));
        }
        if let Some(seed) = self.runner.seed {
            config = config.with_seed(seed);
        }
        config
    }

    /// Initial per-run context
    pub fn initial_context(&self) -> Context {
        Context::from(self.context.clone())
    }

    /// Convert config to a Pipeline template
    pub fn to_pipeline(&self, registry: &TaskRegistry) -> Result<Pipeline> {
        let nodes = build_nodes(&self.nodes, registry)?;
        let pipeline = Pipeline::new(self.id.clone(), nodes)
            .with_context(|| format!("Invalid pipeline '{}'", self.id))?;
        Ok(pipeline.with_context(self.initial_context()))
    }
}

impl NodeConfig {
    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("Node id must not be empty");
        }

        let declared = [
            self.kind.is_some(),
            self.branch.is_some(),
            self.pipeline.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if declared != 1 {
            anyhow::bail!(
                "Node '{}' must declare exactly one of 'kind', 'branch' or 'pipeline'",
                self.id
            );
        }

        if self.validation.is_some() && self.kind.is_none() {
            anyhow::bail!(
                "Node '{}' has a validation gate but is not a task node",
                self.id
            );
        }

        for gate in self.condition.iter().chain(self.validation.iter()) {
            gate.validate(&self.id)?;
        }

        if let Some(branch) = &self.branch {
            for candidate in &branch.candidates {
                candidate.validate()?;
            }
        }
        if let Some(pipeline) = &self.pipeline {
            for node in &pipeline.nodes {
                node.validate()?;
            }
        }
        Ok(())
    }

    /// Build the template node
    pub fn to_node(&self, registry: &TaskRegistry) -> Result<Node> {
        let node = if let Some(kind) = &self.kind {
            let task = registry
                .build(kind, &self.extensions)
                .with_context(|| format!("Failed to build node '{}'", self.id))?;
            let mut leaf = LeafNode::new(self.id.clone(), task);
            if let Some(gate) = &self.validation {
                leaf = leaf.with_validation(gate.to_gate()?);
            }
            Node::from(leaf)
        } else if let Some(branch) = &self.branch {
            let candidates = build_nodes(&branch.candidates, registry)?;
            let mut node = BranchNode::new(self.id.clone(), branch.strategy, candidates);
            if let Some(seed) = branch.seed {
                node = node.with_seed(seed);
            }
            Node::from(node)
        } else if let Some(pipeline) = &self.pipeline {
            let nodes = build_nodes(&pipeline.nodes, registry)?;
            Node::from(
                Pipeline::new(self.id.clone(), nodes)
                    .with_context(|| format!("Invalid pipeline '{}'", self.id))?,
            )
        } else {
            anyhow::bail!(
                "Node '{}' must declare exactly one of 'kind', 'branch' or 'pipeline'",
                self.id
            );
        };

        let mut node = node
            .with_context(Context::from(self.context.clone()))
            .with_extensions(self.extensions.clone());
        if let Some(gate) = &self.condition {
            node = node.with_condition(gate.to_gate()?);
        }
        if let Some(weight) = self.weight {
            node = node.with_weight(weight);
        }
        if let Some(next) = &self.next {
            node = node.with_next(next.clone());
        }
        Ok(node)
    }
}

fn build_nodes(configs: &[NodeConfig], registry: &TaskRegistry) -> Result<Vec<Node>> {
    configs.iter().map(|config| config.to_node(registry)).collect()
}

impl GateConfig {
    fn validate(&self, node_id: &str) -> Result<()> {
        if let GateStrategy::Unrecognized(raw) = &self.strategy {
            tracing::warn!(
                "Gate on node '{}' uses unknown strategy '{}' and will never pass",
                node_id,
                raw
            );
        }
        for check in &self.checks {
            if check.op.needs_operand() && check.value.is_none() {
                anyhow::bail!(
                    "Check '{}' on node '{}' needs a 'value'",
                    check.describe(),
                    node_id
                );
            }
            if check.op == PredicateOp::Matches {
                check.pattern()?;
            }
        }
        Ok(())
    }

    /// Build the gate with one predicate per check
    pub fn to_gate(&self) -> Result<Gate> {
        let mut gate = Gate::new(self.strategy.clone());
        if let Some(id) = &self.id {
            gate = gate.with_id(id.clone());
        }
        for check in &self.checks {
            let label = check.label.clone().unwrap_or_else(|| check.describe());
            gate = gate.try_check(label, check.to_predicate()?);
        }
        Ok(gate)
    }
}

impl PredicateConfig {
    fn describe(&self) -> String {
        match &self.value {
            Some(value) => format!("{} {} {}", self.key, self.op.name(), value),
            None => format!("{} {}", self.key, self.op.name()),
        }
    }

    fn pattern(&self) -> Result<Regex> {
        let raw = self
            .value
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Check '{}' needs a string pattern", self.describe()))?;
        Regex::new(raw).with_context(|| format!("Invalid pattern in check '{}'", self.describe()))
    }

    fn operand(&self) -> Result<Value> {
        self.value
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Check '{}' needs a 'value'", self.describe()))
    }

    fn to_predicate(
        &self,
    ) -> Result<impl Fn(&Context) -> std::result::Result<bool, PredicateError> + Send + Sync + 'static>
    {
        let key = self.key.clone();
        let op = self.op;
        let operand = if op.needs_operand() {
            Some(self.operand()?)
        } else {
            None
        };
        let pattern = if op == PredicateOp::Matches {
            Some(self.pattern()?)
        } else {
            None
        };

        Ok(move |ctx: &Context| {
            let actual = ctx.get(&key);
            match op {
                PredicateOp::Exists => Ok(actual.is_some()),
                PredicateOp::Missing => Ok(actual.is_none()),
                PredicateOp::Truthy => Ok(actual.map(is_truthy).unwrap_or(false)),
                PredicateOp::Equals => Ok(actual == operand.as_ref()),
                PredicateOp::NotEquals => Ok(actual != operand.as_ref()),
                PredicateOp::Gt | PredicateOp::Lt => {
                    let left = number(&key, actual)?;
                    let right = operand
                        .as_ref()
                        .and_then(Value::as_f64)
                        .ok_or_else(|| PredicateError::new(format!("operand for '{}' is not a number", key)))?;
                    Ok(if op == PredicateOp::Gt {
                        left > right
                    } else {
                        left < right
                    })
                }
                PredicateOp::Matches => {
                    let text = actual.and_then(Value::as_str).ok_or_else(|| {
                        PredicateError::new(format!("'{}' is not a string", key))
                    })?;
                    Ok(pattern.as_ref().map(|re| re.is_match(text)).unwrap_or(false))
                }
            }
        })
    }
}

fn number(key: &str, value: Option<&Value>) -> std::result::Result<f64, PredicateError> {
    match value {
        Some(value) => value
            .as_f64()
            .ok_or_else(|| PredicateError::new(format!("'{}' is not a number: {}", key, value))),
        None => Err(PredicateError::new(format!("'{}' is missing", key))),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
