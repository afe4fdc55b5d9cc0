//! graphk - composable execution graphs of nodes, branches and pipelines
//!
//! A [`Pipeline`] template is built once (in code or from YAML) and shared
//! between any number of [`Session`]s, each stepped by a [`Runner`].

pub mod cli;
pub mod core;
pub mod execution;
pub mod tasks;

// Re-export commonly used types
pub use crate::core::config::{NodeConfig, PipelineConfig};
pub use crate::core::{
    BranchNode, Context, Descriptor, ErrorKind, Gate, GateStrategy, GraphError, LeafNode, LogEntry,
    Node, NodeState, Pipeline, SelectionStrategy, SessionStatus, StepStream, Task, TaskError,
};
pub use execution::{Runner, RunnerConfig, RunnerEvent, Session, SessionSnapshot, StepOutcome};
pub use tasks::{EmitTask, TaskRegistry};
