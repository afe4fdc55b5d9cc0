//! Pipeline domain model

use crate::core::{
    context::Context,
    descriptor::Descriptor,
    error::{GraphError, Result},
    node::{Node, NodeAttrs, StepStream},
};
use futures::future::join_all;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// An ordered composition of nodes
///
/// A pipeline is an immutable template: any number of sessions may traverse
/// the same instance. It can itself be a member of another pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub(crate) attrs: NodeAttrs,
    nodes: Vec<Node>,
}

impl Pipeline {
    /// Create a pipeline, validating its members
    ///
    /// Member ids (including branch candidates) must be unique, every `next`
    /// must name a member, and the successor graph must be acyclic.
    pub fn new(id: impl Into<String>, nodes: Vec<Node>) -> Result<Self> {
        let pipeline = Pipeline {
            attrs: NodeAttrs::new(id),
            nodes,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Build without validation, for exercising malformed templates
    #[cfg(test)]
    pub(crate) fn unchecked(id: impl Into<String>, nodes: Vec<Node>) -> Self {
        Pipeline {
            attrs: NodeAttrs::new(id),
            nodes,
        }
    }

    /// Static context of the pipeline itself
    pub fn with_context(mut self, context: Context) -> Self {
        self.attrs.context = std::sync::Arc::new(context);
        self
    }

    pub fn id(&self) -> &str {
        &self.attrs.id
    }

    pub fn context(&self) -> &Context {
        &self.attrs.context
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a member by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    /// Position of a member by id
    pub fn position(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id() == id)
    }

    /// Logical AND over every member's health probe
    pub async fn ping(&self) -> bool {
        join_all(self.nodes.iter().map(|node| node.ping()))
            .await
            .into_iter()
            .all(|healthy| healthy)
    }

    pub fn info(&self) -> Value {
        serde_json::to_value(self.describe()).unwrap_or(Value::Null)
    }

    /// Pipelines are traversed by a runner, never stepped
    pub fn step(&self, _context: &Context) -> Result<StepStream> {
        Err(GraphError::InvalidOperation(format!(
            "step() is not valid on pipeline '{}'; run it with a Runner",
            self.id()
        )))
    }

    pub fn describe(&self) -> Descriptor {
        Descriptor::for_pipeline(self)
    }

    fn validate(&self) -> Result<()> {
        // Check that ids are unique within this pipeline's namespace
        let mut seen = HashSet::new();
        for node in &self.nodes {
            for id in namespace_ids(node) {
                if !seen.insert(id) {
                    return Err(GraphError::InvalidDefinition(format!(
                        "duplicate node id '{}' in pipeline '{}'",
                        id,
                        self.id()
                    )));
                }
            }
        }

        // Check that every `next` references a member
        let positions: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id(), i))
            .collect();

        let mut successors: Vec<Vec<usize>> = Vec::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            let mut targets = Vec::new();
            let mut open_fallthrough = false;
            collect_next(node, None, &mut targets, &mut open_fallthrough);

            let mut edges = Vec::new();
            for target in targets {
                match positions.get(target) {
                    Some(&pos) => edges.push(pos),
                    None => {
                        return Err(GraphError::InvalidDefinition(format!(
                            "node '{}' in pipeline '{}' references unknown next '{}'",
                            node.id(),
                            self.id(),
                            target
                        )))
                    }
                }
            }
            if open_fallthrough && index + 1 < self.nodes.len() {
                edges.push(index + 1);
            }
            successors.push(edges);
        }

        self.check_cycles(&successors)
    }

    fn check_cycles(&self, successors: &[Vec<usize>]) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        fn visit(index: usize, successors: &[Vec<usize>], marks: &mut [Mark]) -> bool {
            match marks[index] {
                Mark::Done => return false,
                Mark::Visiting => return true,
                Mark::Unvisited => {}
            }
            marks[index] = Mark::Visiting;
            for &next in &successors[index] {
                if visit(next, successors, marks) {
                    return true;
                }
            }
            marks[index] = Mark::Done;
            false
        }

        let mut marks = vec![Mark::Unvisited; successors.len()];
        for index in 0..successors.len() {
            if visit(index, successors, &mut marks) {
                return Err(GraphError::InvalidDefinition(format!(
                    "cycle through node '{}' in pipeline '{}'",
                    self.nodes[index].id(),
                    self.id()
                )));
            }
        }
        Ok(())
    }
}

/// Ids a member contributes to the pipeline namespace: itself and, for
/// branches, every candidate (recursively). Nested pipelines keep their own.
fn namespace_ids(node: &Node) -> Vec<&str> {
    let mut ids = vec![node.id()];
    if let Node::Branch(branch) = node {
        for candidate in branch.candidates() {
            ids.extend(namespace_ids(candidate));
        }
    }
    ids
}

/// Collect the `next` targets reachable after leaving `node`
///
/// A branch candidate without its own `next` inherits the branch's, and a
/// path with no `next` at all falls through to the sequential successor.
fn collect_next<'a>(
    node: &'a Node,
    inherited: Option<&'a str>,
    targets: &mut Vec<&'a str>,
    open_fallthrough: &mut bool,
) {
    let next = node.next().or(inherited);
    match node {
        Node::Branch(branch) if !branch.candidates().is_empty() => {
            for candidate in branch.candidates() {
                collect_next(candidate, next, targets, open_fallthrough);
            }
        }
        _ => match next {
            Some(target) => targets.push(target),
            None => *open_fallthrough = true,
        },
    }
}
