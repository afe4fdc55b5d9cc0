//! Test utilities for graphk scenarios

use async_trait::async_trait;
use futures::{stream, StreamExt};
use graphk::core::{
    Context, ErrorKind, GraphError, LogEntry, NodeState, Pipeline, SessionStatus, StepStream,
    Task, TaskError,
};
use graphk::core::config::PipelineConfig;
use graphk::execution::{Runner, RunnerConfig, RunnerEvent, Session};
use graphk::tasks::TaskRegistry;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted call: the values to yield, then an optional failure
#[derive(Debug, Clone)]
pub struct Script {
    pub values: Vec<Value>,
    pub error: Option<String>,
}

impl Script {
    pub fn ok(values: Vec<Value>) -> Self {
        Self {
            values,
            error: None,
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            values: vec![],
            error: Some(message.to_string()),
        }
    }
}

/// Task replaying predefined scripts, one per call; the last one repeats
pub struct ScriptedTask {
    scripts: Vec<Script>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Context>>,
}

impl ScriptedTask {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Contexts the task was stepped with, in order
    pub fn seen(&self) -> Vec<Context> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Task for ScriptedTask {
    async fn ping(&self) -> bool {
        true
    }

    fn info(&self) -> Value {
        serde_json::json!({ "kind": "scripted", "scripts": self.scripts.len() })
    }

    fn step(&self, context: &Context) -> StepStream {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(context.clone());

        let script = self
            .scripts
            .get(call)
            .or_else(|| self.scripts.last())
            .cloned()
            .unwrap_or_else(|| Script::ok(vec![]));
        let failure = script.error.map(|m| Err(TaskError::new(m)));
        stream::iter(script.values.into_iter().map(Ok))
            .chain(stream::iter(failure))
            .boxed()
    }
}

/// Registry with the built-ins plus `scripted` kinds bound to the given tasks
///
/// A node with `kind: scripted` and `script: <name>` uses `tasks[name]`.
pub fn registry_with(tasks: Vec<(&str, Arc<ScriptedTask>)>) -> TaskRegistry {
    let tasks: Vec<(String, Arc<ScriptedTask>)> = tasks
        .into_iter()
        .map(|(name, task)| (name.to_string(), task))
        .collect();
    let mut registry = TaskRegistry::with_builtins();
    registry.register("scripted", move |extensions| {
        let name = extensions
            .get("script")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("scripted node needs 'script'"))?;
        let task = tasks
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, task)| task.clone())
            .ok_or_else(|| anyhow::anyhow!("no script named '{}'", name))?;
        Ok(task as Arc<dyn Task>)
    });
    registry
}

/// Build a pipeline template and runner from YAML
pub fn load(yaml: &str, registry: &TaskRegistry) -> (Arc<Pipeline>, Runner, Context) {
    let config = PipelineConfig::from_yaml(yaml)
        .unwrap_or_else(|e| panic!("Failed to parse pipeline YAML: {:#}", e));
    let pipeline = config
        .to_pipeline(registry)
        .unwrap_or_else(|e| panic!("Failed to build pipeline: {:#}", e));
    (
        Arc::new(pipeline),
        Runner::new(config.runner_config()),
        config.initial_context(),
    )
}

/// Outcome of running a session to its end
pub struct TestRun {
    pub session: Session,
    pub result: Result<SessionStatus, GraphError>,
    pub events: Vec<RunnerEvent>,
}

impl TestRun {
    pub fn logged(&self) -> Vec<String> {
        logged(&self.session)
    }

    pub fn entry(&self, path: &str) -> &LogEntry {
        self.session
            .log()
            .iter()
            .find(|e| e.path == path)
            .unwrap_or_else(|| panic!("No log entry for '{}' in {:?}", path, self.logged()))
    }
}

/// Run a YAML pipeline with the built-in registry
pub async fn run_yaml(yaml: &str) -> TestRun {
    run_yaml_with(yaml, &TaskRegistry::with_builtins(), Context::new()).await
}

/// Run a YAML pipeline with a custom registry and extra per-run context
pub async fn run_yaml_with(yaml: &str, registry: &TaskRegistry, overrides: Context) -> TestRun {
    let (pipeline, runner, context) = load(yaml, registry);
    run_with(pipeline, runner.config().clone(), context.merged_with(&overrides)).await
}

/// Run a template to its end, collecting runner events
pub async fn run_with(pipeline: Arc<Pipeline>, config: RunnerConfig, context: Context) -> TestRun {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let runner = Runner::new(config).with_event_handler(move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    let mut session = runner.start(pipeline, context);
    let result = runner.run(&mut session).await;
    let events = events.lock().unwrap().clone();

    TestRun {
        session,
        result,
        events,
    }
}

pub fn logged(session: &Session) -> Vec<String> {
    session.log().iter().map(|e| e.path.clone()).collect()
}

/// Assert the session completed and logged exactly `expected`, in order
pub fn assert_completed(run: &TestRun, expected: &[&str]) {
    assert!(
        matches!(run.result, Ok(SessionStatus::Completed)),
        "Session should have completed, got {:?} (failure: {:?})",
        run.result,
        run.session.failure()
    );
    assert_eq!(run.logged(), expected, "Unexpected log order");
}

/// Assert the session failed with `kind` at `node`
pub fn assert_failed(run: &TestRun, kind: ErrorKind, node: &str) {
    assert_eq!(run.session.status(), SessionStatus::Failed);
    let failure = run
        .session
        .failure()
        .unwrap_or_else(|| panic!("Failed session has no failure record"));
    assert_eq!(failure.kind, kind, "Unexpected failure: {}", failure.message);
    assert_eq!(failure.node_id.as_deref(), Some(node));
}

/// Attempts recorded in a node's final state
pub fn attempts(session: &Session, node: &str) -> usize {
    match session.node_state(node) {
        NodeState::Done { attempts, .. } | NodeState::Failed { attempts, .. } => attempts,
        _ => 0,
    }
}
