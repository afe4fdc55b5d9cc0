//! Runner - drives a session through its pipeline one traversal step at a time

use crate::core::{
    branch::BranchNode,
    context::Context,
    error::{ErrorKind, GraphError, Result},
    node::{LeafNode, Node},
    pipeline::Pipeline,
    state::{Failure, LogEntry, NodeState, SessionStatus},
};
use crate::execution::cursor::{qualified_id, resolve};
use crate::execution::session::Session;
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runner settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Extra attempts for a leaf whose execution or validation fails
    pub max_retries: usize,

    /// Limit for consuming one leaf's step sequence
    pub step_timeout: Option<Duration>,

    /// Seed for the random source of sessions this runner creates
    pub seed: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            step_timeout: None,
            seed: None,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = Some(step_timeout);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Events that can occur while a session is driven
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    SessionStarted {
        session_id: Uuid,
        pipeline_id: String,
    },
    SessionPaused {
        session_id: Uuid,
    },
    SessionResumed {
        session_id: Uuid,
    },
    BranchSelected {
        branch: String,
        selected: String,
    },
    PipelineEntered {
        pipeline: String,
    },
    PipelineExited {
        pipeline: String,
    },
    NodeStarted {
        node: String,
        attempt: usize,
    },
    NodeOutput {
        node: String,
        value: Value,
    },
    NodeCompleted {
        node: String,
        attempts: usize,
    },
    NodeSkipped {
        node: String,
    },
    NodeRetrying {
        node: String,
        attempt: usize,
        max_retries: usize,
        error: String,
    },
    SessionFinished {
        session_id: Uuid,
        status: SessionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&RunnerEvent) + Send + Sync>;

/// What a single call to [`Runner::step`] did
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A branch resolved to one of its candidates
    Selected { branch: String, node: String },
    /// The cursor moved into a nested pipeline
    Entered { pipeline: String },
    /// A leaf ran and its result was logged
    Executed { node: String, attempts: usize },
    /// A node's condition was closed
    Skipped { node: String },
    /// A pause request stopped the session at this boundary
    Paused,
    /// The outermost pipeline was exhausted
    Completed,
    /// The session failed on this step
    Failed {
        kind: ErrorKind,
        node: Option<String>,
    },
}

/// Stateless driver for sessions
///
/// A runner holds configuration only; every piece of run state lives on the
/// [`Session`] it is given, so one runner can drive many sessions.
#[derive(Clone, Default)]
pub struct Runner {
    config: RunnerConfig,
    event_handlers: Vec<EventHandler>,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RunnerEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Create a session over `pipeline` with an initial per-run context
    pub fn start(&self, pipeline: Arc<Pipeline>, context: Context) -> Session {
        match self.config.seed {
            Some(seed) => Session::with_seed(pipeline, context, seed),
            None => Session::new(pipeline, context),
        }
    }

    /// Step the session until it completes, fails or pauses
    ///
    /// Dead ends and rejected outputs end the session as `Failed` and are
    /// reported through [`Session::failure`]; predicate and execution
    /// failures also fail the session but are returned as errors.
    pub async fn run(&self, session: &mut Session) -> Result<SessionStatus> {
        loop {
            self.step(session).await?;
            match session.status() {
                SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Paused => {
                    return Ok(session.status())
                }
                SessionStatus::Created | SessionStatus::Running => {}
            }
        }
    }

    /// Advance the session by exactly one unit of traversal
    pub async fn step(&self, session: &mut Session) -> Result<StepOutcome> {
        match session.status() {
            SessionStatus::Completed | SessionStatus::Failed => {
                return Err(GraphError::InvalidOperation(format!(
                    "session {} is already {:?}",
                    session.id(),
                    session.status()
                )));
            }
            SessionStatus::Created => {
                session.mark_started();
                info!(
                    "Starting session {} of pipeline {}",
                    session.id(),
                    session.pipeline().id()
                );
                self.emit(RunnerEvent::SessionStarted {
                    session_id: session.id(),
                    pipeline_id: session.pipeline().id().to_string(),
                });
            }
            SessionStatus::Paused => {
                if session.control().is_pause_requested() {
                    return Ok(StepOutcome::Paused);
                }
                session.set_status(SessionStatus::Running);
                info!("Resuming session {}", session.id());
                self.emit(RunnerEvent::SessionResumed {
                    session_id: session.id(),
                });
            }
            SessionStatus::Running => {}
        }

        if session.control().is_pause_requested() {
            session.set_status(SessionStatus::Paused);
            info!("Session {} paused", session.id());
            self.emit(RunnerEvent::SessionPaused {
                session_id: session.id(),
            });
            return Ok(StepOutcome::Paused);
        }

        let template = Arc::clone(session.pipeline());
        let path = match session.cursor().path() {
            Some(path) => path.to_vec(),
            None => {
                self.complete(session);
                return Ok(StepOutcome::Completed);
            }
        };

        let node = match resolve(&template, &path) {
            Some(node) => node,
            None => {
                let err = GraphError::InvalidOperation(format!(
                    "cursor {:?} does not resolve in pipeline '{}'",
                    path,
                    template.id()
                ));
                let context = session.context().clone();
                return self.finish_with(session, err, context);
            }
        };
        let key = qualified_id(&template, &path);
        let merged = node.merged_context(session.context());

        match node.is_open(&merged) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Condition closed for {}, skipping", key);
                session.set_node_state(
                    &key,
                    NodeState::Skipped {
                        reason: "condition gate closed".to_string(),
                    },
                );
                self.emit(RunnerEvent::NodeSkipped { node: key.clone() });
                if let Some(failed) = self.advance(session, &template)? {
                    return Ok(failed);
                }
                return Ok(StepOutcome::Skipped { node: key });
            }
            Err(err) => return self.finish_with(session, err, merged),
        }

        match node {
            Node::Branch(branch) => self.step_branch(session, branch, key, merged),
            Node::Pipeline(pipeline) => self.step_pipeline(session, &template, pipeline, key),
            Node::Leaf(leaf) => self.step_leaf(session, &template, leaf, key, merged).await,
        }
    }

    fn step_branch(
        &self,
        session: &mut Session,
        branch: &BranchNode,
        key: String,
        merged: Context,
    ) -> Result<StepOutcome> {
        let index = match session.select(branch) {
            Ok(Some(index)) => index,
            Ok(None) => {
                warn!("Branch {} has no valid candidate", key);
                let err = GraphError::DeadEnd {
                    branch: branch.id().to_string(),
                };
                return self.finish_with(session, err, merged);
            }
            Err(err) => return self.finish_with(session, err, merged),
        };

        let selected = branch.candidates()[index].id().to_string();
        let now = Utc::now();
        session.set_node_state(
            &key,
            NodeState::Done {
                attempts: 1,
                started_at: now,
                completed_at: now,
            },
        );
        session.cursor_mut().enter(index);

        info!("Branch {} selected {}", key, selected);
        self.emit(RunnerEvent::BranchSelected {
            branch: key.clone(),
            selected: selected.clone(),
        });
        Ok(StepOutcome::Selected {
            branch: key,
            node: selected,
        })
    }

    fn step_pipeline(
        &self,
        session: &mut Session,
        template: &Pipeline,
        pipeline: &Pipeline,
        key: String,
    ) -> Result<StepOutcome> {
        session.set_node_state(
            &key,
            NodeState::Running {
                started_at: Utc::now(),
                attempt: 1,
            },
        );
        debug!("Entering pipeline {}", key);
        self.emit(RunnerEvent::PipelineEntered {
            pipeline: key.clone(),
        });

        if pipeline.is_empty() {
            self.exit_pipeline(session, &key);
            if let Some(failed) = self.advance(session, template)? {
                return Ok(failed);
            }
        } else {
            session.cursor_mut().enter(0);
        }

        Ok(StepOutcome::Entered { pipeline: key })
    }

    async fn step_leaf(
        &self,
        session: &mut Session,
        template: &Pipeline,
        leaf: &LeafNode,
        key: String,
        merged: Context,
    ) -> Result<StepOutcome> {
        let node_id = leaf.attrs.id.as_str();
        let max_attempts = self.config.max_retries.saturating_add(1);
        let started_at = Utc::now();
        let mut attempt = 0;

        let error = loop {
            attempt += 1;
            session.set_node_state(&key, NodeState::Running { started_at, attempt });
            self.emit(RunnerEvent::NodeStarted {
                node: key.clone(),
                attempt,
            });

            let error = match self.consume(leaf, &key, &merged).await {
                Ok(outputs) => {
                    let result = outputs.last().cloned().unwrap_or(Value::Null);
                    match self.validate(leaf, &merged, &result) {
                        Ok(true) => {
                            info!("Node {} completed after {} attempt(s)", key, attempt);
                            session.push_log(LogEntry {
                                node_id: node_id.to_string(),
                                path: key.clone(),
                                result: result.clone(),
                                outputs,
                                attempts: attempt,
                                timestamp: Utc::now(),
                            });
                            session.context_mut().set_output(node_id, result);
                            session.set_node_state(
                                &key,
                                NodeState::Done {
                                    attempts: attempt,
                                    started_at,
                                    completed_at: Utc::now(),
                                },
                            );
                            self.emit(RunnerEvent::NodeCompleted {
                                node: key.clone(),
                                attempts: attempt,
                            });
                            if let Some(failed) = self.advance(session, template)? {
                                return Ok(failed);
                            }
                            return Ok(StepOutcome::Executed {
                                node: key,
                                attempts: attempt,
                            });
                        }
                        Ok(false) => GraphError::ValidationFailure {
                            node: node_id.to_string(),
                            attempts: attempt,
                        },
                        Err(err) => err,
                    }
                }
                Err(err) => err,
            };

            if attempt >= max_attempts {
                break error;
            }

            warn!(
                "Node {} attempt {} failed ({}), retrying",
                key, attempt, error
            );
            self.emit(RunnerEvent::NodeRetrying {
                node: key.clone(),
                attempt: attempt + 1,
                max_retries: self.config.max_retries,
                error: error.to_string(),
            });
        };

        session.set_node_state(
            &key,
            NodeState::Failed {
                error: error.to_string(),
                attempts: attempt,
                failed_at: Utc::now(),
            },
        );
        self.finish_with(session, error, merged)
    }

    /// Drain one fresh step sequence of a leaf
    async fn consume(&self, leaf: &LeafNode, key: &str, context: &Context) -> Result<Vec<Value>> {
        let node_id = leaf.attrs.id.clone();
        let collect = async {
            let mut stream = leaf.step(context);
            let mut outputs = Vec::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(value) => {
                        self.emit(RunnerEvent::NodeOutput {
                            node: key.to_string(),
                            value: value.clone(),
                        });
                        outputs.push(value);
                    }
                    Err(err) => {
                        error!("Node {} failed: {}", key, err);
                        return Err(GraphError::NodeExecutionFailure {
                            node: node_id.clone(),
                            message: err.message,
                        });
                    }
                }
            }
            Ok(outputs)
        };

        match self.config.step_timeout {
            Some(limit) => match timeout(limit, collect).await {
                Ok(result) => result,
                Err(_) => {
                    error!("Timeout for node {} after {:?}", key, limit);
                    Err(GraphError::NodeExecutionFailure {
                        node: leaf.attrs.id.clone(),
                        message: format!("timed out after {:?}", limit),
                    })
                }
            },
            None => collect.await,
        }
    }

    /// Assess the validation gate with the result exposed as `result`
    fn validate(&self, leaf: &LeafNode, merged: &Context, result: &Value) -> Result<bool> {
        match leaf.validation() {
            Some(gate) => {
                let context = merged.clone().with("result", result.clone());
                gate.assess(&context)
                    .map_err(|source| GraphError::PredicateFailure {
                        node: leaf.attrs.id.clone(),
                        source,
                    })
            }
            None => Ok(true),
        }
    }

    /// Move the cursor past the current node, closing exhausted frames
    ///
    /// Returns the `Failed` outcome when the cursor cannot move on.
    fn advance(&self, session: &mut Session, template: &Pipeline) -> Result<Option<StepOutcome>> {
        let exited = match session.cursor_mut().advance(template) {
            Ok(exited) => exited,
            Err(err) => {
                let context = session.context().clone();
                return self.finish_with(session, err, context).map(Some);
            }
        };

        for path in exited {
            let key = qualified_id(template, &path);
            self.exit_pipeline(session, &key);
        }

        if session.cursor().is_exhausted() {
            self.complete(session);
        }
        Ok(None)
    }

    fn exit_pipeline(&self, session: &mut Session, key: &str) {
        let started_at = match session.node_state(key) {
            NodeState::Running { started_at, .. } => started_at,
            _ => Utc::now(),
        };
        session.set_node_state(
            key,
            NodeState::Done {
                attempts: 1,
                started_at,
                completed_at: Utc::now(),
            },
        );
        debug!("Leaving pipeline {}", key);
        self.emit(RunnerEvent::PipelineExited {
            pipeline: key.to_string(),
        });
    }

    fn complete(&self, session: &mut Session) {
        session.complete();
        info!(
            "Session {} of pipeline {} completed with {} log entries",
            session.id(),
            session.pipeline().id(),
            session.log().len()
        );
        self.emit(RunnerEvent::SessionFinished {
            session_id: session.id(),
            status: SessionStatus::Completed,
        });
    }

    /// Record `err` as the session's failure
    ///
    /// Returns the error itself for failures the caller must see, otherwise a
    /// `Failed` outcome.
    fn finish_with(
        &self,
        session: &mut Session,
        err: GraphError,
        context: Context,
    ) -> Result<StepOutcome> {
        let node = err.node_id().map(str::to_string);
        error!("Session {} failed: {}", session.id(), err);
        session.fail(Failure {
            kind: err.kind(),
            node_id: node.clone(),
            message: err.to_string(),
            context,
            failed_at: Utc::now(),
        });
        self.emit(RunnerEvent::SessionFinished {
            session_id: session.id(),
            status: SessionStatus::Failed,
        });

        if err.is_raised() {
            Err(err)
        } else {
            Ok(StepOutcome::Failed {
                kind: err.kind(),
                node,
            })
        }
    }

    fn emit(&self, event: RunnerEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }
}
