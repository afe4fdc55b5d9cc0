//! Node domain model

use crate::core::{
    branch::BranchNode,
    context::{Context, Extensions},
    descriptor::Descriptor,
    error::{GraphError, Result, TaskError},
    gate::Gate,
    pipeline::Pipeline,
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Lazy, finite sequence of values produced by one execution of a task
pub type StepStream = BoxStream<'static, std::result::Result<Value, TaskError>>;

/// The work behind a leaf node
///
/// Implementations supply the real effect (an HTTP call, a model invocation,
/// a computation); the graph only relies on this contract.
#[async_trait]
pub trait Task: Send + Sync {
    /// Health / connectivity probe. Must not have side effects.
    async fn ping(&self) -> bool;

    /// Static capability descriptor
    fn info(&self) -> Value;

    /// Start producing the step sequence
    ///
    /// Every call begins a fresh sequence; a stream is never resumed from the
    /// state of an earlier call. Exhausting the stream is normal completion,
    /// an `Err` item is an unrecoverable failure.
    fn step(&self, context: &Context) -> StepStream;
}

/// Attributes shared by every kind of node
#[derive(Debug, Clone)]
pub struct NodeAttrs {
    pub(crate) id: String,
    pub(crate) context: Arc<Context>,
    pub(crate) condition: Option<Gate>,
    pub(crate) weight: Option<i64>,
    pub(crate) next: Option<String>,
    pub(crate) extensions: Extensions,
}

impl NodeAttrs {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: Arc::new(Context::new()),
            condition: None,
            weight: None,
            next: None,
            extensions: Extensions::new(),
        }
    }
}

/// A node whose work is performed by a [`Task`]
#[derive(Clone)]
pub struct LeafNode {
    pub(crate) attrs: NodeAttrs,
    validation: Option<Gate>,
    task: Arc<dyn Task>,
}

impl LeafNode {
    pub fn new(id: impl Into<String>, task: Arc<dyn Task>) -> Self {
        Self {
            attrs: NodeAttrs::new(id),
            validation: None,
            task,
        }
    }

    /// Gate evaluated against the produced result before the node counts as done
    pub fn with_validation(mut self, gate: Gate) -> Self {
        self.validation = Some(gate);
        self
    }

    pub fn validation(&self) -> Option<&Gate> {
        self.validation.as_ref()
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    pub fn step(&self, context: &Context) -> StepStream {
        self.task.step(context)
    }
}

impl fmt::Debug for LeafNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafNode")
            .field("attrs", &self.attrs)
            .field("validation", &self.validation)
            .field("task", &self.task.info())
            .finish()
    }
}

/// Any node that can appear in a pipeline
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(LeafNode),
    Branch(BranchNode),
    Pipeline(Pipeline),
}

impl Node {
    /// Create a leaf node backed by a task
    pub fn leaf(id: impl Into<String>, task: Arc<dyn Task>) -> Self {
        Node::Leaf(LeafNode::new(id, task))
    }

    pub fn attrs(&self) -> &NodeAttrs {
        match self {
            Node::Leaf(leaf) => &leaf.attrs,
            Node::Branch(branch) => &branch.attrs,
            Node::Pipeline(pipeline) => &pipeline.attrs,
        }
    }

    fn attrs_mut(&mut self) -> &mut NodeAttrs {
        match self {
            Node::Leaf(leaf) => &mut leaf.attrs,
            Node::Branch(branch) => &mut branch.attrs,
            Node::Pipeline(pipeline) => &mut pipeline.attrs,
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.attrs_mut().context = Arc::new(context);
        self
    }

    /// Share an existing static context instead of copying it
    pub fn with_shared_context(mut self, context: Arc<Context>) -> Self {
        self.attrs_mut().context = context;
        self
    }

    pub fn with_condition(mut self, gate: Gate) -> Self {
        self.attrs_mut().condition = Some(gate);
        self
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.attrs_mut().weight = Some(weight);
        self
    }

    /// Successor, by id of a member of the owning pipeline
    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.attrs_mut().next = Some(next.into());
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.attrs_mut().extensions = extensions;
        self
    }

    pub fn id(&self) -> &str {
        &self.attrs().id
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.attrs().context
    }

    pub fn condition(&self) -> Option<&Gate> {
        self.attrs().condition.as_ref()
    }

    pub fn weight(&self) -> Option<i64> {
        self.attrs().weight
    }

    pub fn next(&self) -> Option<&str> {
        self.attrs().next.as_deref()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.attrs().extensions
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Leaf(_) => "leaf",
            Node::Branch(_) => "branch",
            Node::Pipeline(_) => "pipeline",
        }
    }

    /// Candidates of a branch or members of a pipeline
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Leaf(_) => &[],
            Node::Branch(branch) => branch.candidates(),
            Node::Pipeline(pipeline) => pipeline.nodes(),
        }
    }

    pub fn ping(&self) -> BoxFuture<'_, bool> {
        async move {
            match self {
                Node::Leaf(leaf) => leaf.task.ping().await,
                Node::Branch(branch) => branch.ping().await,
                Node::Pipeline(pipeline) => pipeline.ping().await,
            }
        }
        .boxed()
    }

    pub fn info(&self) -> Value {
        match self {
            Node::Leaf(leaf) => leaf.task.info(),
            Node::Branch(branch) => branch.info(),
            Node::Pipeline(pipeline) => pipeline.info(),
        }
    }

    /// Start the node's step sequence
    ///
    /// Only leaves can be stepped; branches must be resolved with
    /// [`BranchNode::select`] and pipelines traversed by a runner.
    pub fn step(&self, context: &Context) -> Result<StepStream> {
        match self {
            Node::Leaf(leaf) => Ok(leaf.step(context)),
            Node::Branch(branch) => branch.step(context),
            Node::Pipeline(pipeline) => pipeline.step(context),
        }
    }

    pub fn describe(&self) -> Descriptor {
        match self {
            Node::Leaf(leaf) => Descriptor::for_leaf(leaf),
            Node::Branch(branch) => branch.describe(),
            Node::Pipeline(pipeline) => pipeline.describe(),
        }
    }

    /// Static context of this node with `run_context` applied on top
    pub fn merged_context(&self, run_context: &Context) -> Context {
        self.context().merged_with(run_context)
    }

    /// Evaluate the condition gate; nodes without one are always open
    pub(crate) fn is_open(&self, context: &Context) -> Result<bool> {
        match self.condition() {
            Some(gate) => gate.assess(context).map_err(|source| GraphError::PredicateFailure {
                node: self.id().to_string(),
                source,
            }),
            None => Ok(true),
        }
    }
}

impl From<LeafNode> for Node {
    fn from(leaf: LeafNode) -> Self {
        Node::Leaf(leaf)
    }
}

impl From<BranchNode> for Node {
    fn from(branch: BranchNode) -> Self {
        Node::Branch(branch)
    }
}

impl From<Pipeline> for Node {
    fn from(pipeline: Pipeline) -> Self {
        Node::Pipeline(pipeline)
    }
}
