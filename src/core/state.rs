//! Execution state models

use crate::core::{context::Context, error::ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session has not been stepped yet
    Created,
    /// Session is being driven by a runner
    Running,
    /// Session stopped at a step boundary on request
    Paused,
    /// Outermost pipeline exhausted
    Completed,
    /// Session ended on a dead end or an error
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

/// State of a single node within one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum NodeState {
    /// Node has not been reached
    Pending,
    /// Node is executing (or, for a pipeline, its members are)
    Running {
        started_at: DateTime<Utc>,
        attempt: usize,
    },
    /// Node finished and its output was accepted
    Done {
        attempts: usize,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Condition gate was closed
    Skipped { reason: String },
    /// Node failed after all attempts
    Failed {
        error: String,
        attempts: usize,
        failed_at: DateTime<Utc>,
    },
}

impl NodeState {
    /// Check if node is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeState::Done { .. } | NodeState::Failed { .. } | NodeState::Skipped { .. }
        )
    }
}

/// One accepted node outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Id of the node
    pub node_id: String,

    /// Slash-separated ids from the outermost pipeline down to the node
    pub path: String,

    /// Last value the node produced (null when it produced none)
    pub result: Value,

    /// Every value the node produced, in order
    pub outputs: Vec<Value>,

    /// Attempts it took to produce an accepted result
    pub attempts: usize,

    pub timestamp: DateTime<Utc>,
}

/// Why a session failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,

    /// Node the failure originated from, if any
    pub node_id: Option<String>,

    pub message: String,

    /// Merged context visible at the failing node
    pub context: Context,

    pub failed_at: DateTime<Utc>,
}
