//! Traversal cursor - the current node path within a pipeline template
//!
//! A path is a list of child indices starting at the outermost pipeline's
//! members. Each index selects a member of a pipeline or a candidate of a
//! branch; every prefix that ends on a pipeline is a traversal frame.

use crate::core::{
    error::{GraphError, Result},
    node::Node,
    pipeline::Pipeline,
};
use serde::{Deserialize, Serialize};

/// Position of a session within its pipeline template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    path: Option<Vec<usize>>,
}

impl Cursor {
    /// Cursor on the first member of `root`, or exhausted if it has none
    pub fn start(root: &Pipeline) -> Self {
        Self {
            path: (!root.is_empty()).then(|| vec![0]),
        }
    }

    /// Current path, `None` once the outermost pipeline is exhausted
    pub fn path(&self) -> Option<&[usize]> {
        self.path.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.path.is_none()
    }

    /// Number of pipeline frames on the stack, the outermost included
    pub fn depth(&self, root: &Pipeline) -> usize {
        match &self.path {
            None => 0,
            Some(path) => 1 + (1..path.len())
                .filter(|&len| matches!(resolve(root, &path[..len]), Some(Node::Pipeline(_))))
                .count(),
        }
    }

    /// Descend into child `index` of the node under the cursor
    pub(crate) fn enter(&mut self, index: usize) {
        if let Some(path) = self.path.as_mut() {
            path.push(index);
        }
    }

    /// Move past the node under the cursor
    ///
    /// The successor is the innermost `next` found on the node or on the
    /// branches that selected it, resolved among the members of the enclosing
    /// pipeline; without one the cursor moves to the following member. A
    /// frame whose members are exhausted is popped and traversal continues
    /// after the nested pipeline. Returns the paths of the pipelines exited.
    pub(crate) fn advance(&mut self, root: &Pipeline) -> Result<Vec<Vec<usize>>> {
        let mut path = match self.path.take() {
            Some(path) => path,
            None => return Ok(Vec::new()),
        };
        let mut exited = Vec::new();

        loop {
            let frame_index = frame_start(root, &path)?;
            let frame = pipeline_at(root, &path[..frame_index]).ok_or_else(|| {
                GraphError::InvalidOperation(format!("cursor {:?} is outside the template", path))
            })?;

            let next = (frame_index..path.len())
                .rev()
                .find_map(|end| resolve(root, &path[..=end]).and_then(Node::next));

            let target = match next {
                Some(id) => Some(frame.position(id).ok_or_else(|| {
                    GraphError::InvalidDefinition(format!(
                        "next '{}' is not a member of pipeline '{}'",
                        id,
                        frame.id()
                    ))
                })?),
                None => {
                    let following = path[frame_index] + 1;
                    (following < frame.len()).then_some(following)
                }
            };

            path.truncate(frame_index);
            if let Some(index) = target {
                path.push(index);
                self.path = Some(path);
                return Ok(exited);
            }
            if path.is_empty() {
                return Ok(exited);
            }
            // The nested pipeline at `path` is exhausted; continue after it
            exited.push(path.clone());
        }
    }
}

/// Resolve a path to a node of the template
pub fn resolve<'a>(root: &'a Pipeline, path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = root.nodes().get(*first)?;
    for &index in rest {
        node = node.children().get(index)?;
    }
    Some(node)
}

/// Slash-separated ids along a path, e.g. `ingest/route/fast`
pub fn qualified_id(root: &Pipeline, path: &[usize]) -> String {
    (1..=path.len())
        .filter_map(|len| resolve(root, &path[..len]).map(Node::id))
        .collect::<Vec<_>>()
        .join("/")
}

/// The pipeline a path prefix designates (the empty prefix is the root)
fn pipeline_at<'a>(root: &'a Pipeline, prefix: &[usize]) -> Option<&'a Pipeline> {
    if prefix.is_empty() {
        return Some(root);
    }
    match resolve(root, prefix)? {
        Node::Pipeline(pipeline) => Some(pipeline),
        _ => None,
    }
}

/// Index of the last path segment whose container is a pipeline
///
/// Segments after it are branch selections standing in for that member.
fn frame_start(root: &Pipeline, path: &[usize]) -> Result<usize> {
    let mut start = 0;
    for end in 0..path.len() {
        if pipeline_at(root, &path[..end]).is_some() {
            start = end;
        }
    }
    if resolve(root, path).is_none() {
        return Err(GraphError::InvalidOperation(format!(
            "cursor {:?} is outside the template",
            path
        )));
    }
    Ok(start)
}
