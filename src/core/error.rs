//! Error taxonomy for graph construction and traversal

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised by a gate predicate that could not evaluate the context
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PredicateError {
    pub message: String,
}

impl PredicateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Raised by a task while producing its step sequence
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TaskError {
    pub message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised by the graph model and the runner
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Predicate failed in gate of '{node}': {source}")]
    PredicateFailure {
        node: String,
        #[source]
        source: PredicateError,
    },

    #[error("Node '{node}' failed during execution: {message}")]
    NodeExecutionFailure { node: String, message: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Branch '{branch}' has no valid candidate")]
    DeadEnd { branch: String },

    #[error("Output of node '{node}' rejected by validation after {attempts} attempt(s)")]
    ValidationFailure { node: String, attempts: usize },

    #[error("Invalid pipeline definition: {0}")]
    InvalidDefinition(String),
}

/// Serializable error classification recorded on failed sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PredicateFailure,
    NodeExecutionFailure,
    InvalidOperation,
    DeadEnd,
    ValidationFailure,
    InvalidDefinition,
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::PredicateFailure { .. } => ErrorKind::PredicateFailure,
            GraphError::NodeExecutionFailure { .. } => ErrorKind::NodeExecutionFailure,
            GraphError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            GraphError::DeadEnd { .. } => ErrorKind::DeadEnd,
            GraphError::ValidationFailure { .. } => ErrorKind::ValidationFailure,
            GraphError::InvalidDefinition(_) => ErrorKind::InvalidDefinition,
        }
    }

    /// Node the error originated from, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            GraphError::PredicateFailure { node, .. }
            | GraphError::NodeExecutionFailure { node, .. }
            | GraphError::ValidationFailure { node, .. } => Some(node),
            GraphError::DeadEnd { branch } => Some(branch),
            GraphError::InvalidOperation(_) | GraphError::InvalidDefinition(_) => None,
        }
    }

    /// Whether a session failing with this error hands it back to the caller of `run`
    ///
    /// Dead ends and rejected outputs are normal terminal outcomes and are only
    /// recorded on the session.
    pub fn is_raised(&self) -> bool {
        !matches!(
            self,
            GraphError::DeadEnd { .. } | GraphError::ValidationFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
