//! Session - one execution instance of a pipeline template

use crate::core::{
    branch::BranchNode,
    context::Context,
    error::Result,
    pipeline::Pipeline,
    state::{Failure, LogEntry, NodeState, SessionStatus},
};
use crate::execution::cursor::{qualified_id, Cursor};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Cloneable handle carrying a session's run/pause intent
///
/// The flag is only consulted at step boundaries: a step already in flight
/// completes before a pause takes effect.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    pause_requested: Arc<AtomicBool>,
}

impl SessionControl {
    /// Ask the runner to stop at the next step boundary
    pub fn pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    /// Clear a pause request so a runner may continue
    pub fn start(&self) {
        self.pause_requested.store(false, Ordering::SeqCst);
    }

    pub fn is_pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::SeqCst)
    }
}

/// Mutable state of one run over a shared, read-only pipeline template
pub struct Session {
    id: Uuid,
    pipeline: Arc<Pipeline>,
    cursor: Cursor,
    context: Context,
    log: Vec<LogEntry>,
    status: SessionStatus,
    node_states: BTreeMap<String, NodeState>,
    failure: Option<Failure>,
    control: SessionControl,
    rng: StdRng,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session with an entropy-seeded random source
    pub fn new(pipeline: Arc<Pipeline>, context: Context) -> Self {
        Self::with_rng(pipeline, context, StdRng::from_entropy())
    }

    /// Create a session whose random branch selections are reproducible
    pub fn with_seed(pipeline: Arc<Pipeline>, context: Context, seed: u64) -> Self {
        Self::with_rng(pipeline, context, StdRng::seed_from_u64(seed))
    }

    fn with_rng(pipeline: Arc<Pipeline>, context: Context, rng: StdRng) -> Self {
        Self {
            id: Uuid::new_v4(),
            cursor: Cursor::start(&pipeline),
            pipeline,
            context,
            log: Vec::new(),
            status: SessionStatus::Created,
            node_states: BTreeMap::new(),
            failure: None,
            control: SessionControl::default(),
            rng,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Per-run context, distinct from every node's static context
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Accepted outcomes in traversal order
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// State of a node by its qualified id (e.g. `inner/fetch`)
    pub fn node_state(&self, qualified_id: &str) -> NodeState {
        self.node_states
            .get(qualified_id)
            .cloned()
            .unwrap_or(NodeState::Pending)
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Request a pause at the next step boundary
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Clear a pending pause request
    pub fn start(&self) {
        self.control.start();
    }

    /// Whether the session is running and no pause has been requested
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running && !self.control.is_pause_requested()
    }

    /// Serializable view suitable for an external store
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            pipeline_id: self.pipeline.id().to_string(),
            status: self.status,
            running: self.is_running(),
            cursor: self.cursor.path().map(<[usize]>::to_vec),
            current_node: self
                .cursor
                .path()
                .map(|path| qualified_id(&self.pipeline, path)),
            context: self.context.clone(),
            log: self.log.clone(),
            node_states: self.node_states.clone(),
            failure: self.failure.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    pub(crate) fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub(crate) fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub(crate) fn select(&mut self, branch: &BranchNode) -> Result<Option<usize>> {
        branch.select_with(&self.context, &mut self.rng)
    }

    pub(crate) fn set_node_state(&mut self, qualified_id: &str, state: NodeState) {
        self.node_states.insert(qualified_id.to_string(), state);
    }

    pub(crate) fn push_log(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }

    pub(crate) fn mark_started(&mut self) {
        self.status = SessionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    pub(crate) fn complete(&mut self) {
        self.status = SessionStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, failure: Failure) {
        self.status = SessionStatus::Failed;
        self.finished_at = Some(failure.failed_at);
        self.failure = Some(failure);
    }
}

/// Point-in-time copy of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub pipeline_id: String,
    pub status: SessionStatus,
    pub running: bool,
    pub cursor: Option<Vec<usize>>,
    pub current_node: Option<String>,
    pub context: Context,
    pub log: Vec<LogEntry>,
    pub node_states: BTreeMap<String, NodeState>,
    pub failure: Option<Failure>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
