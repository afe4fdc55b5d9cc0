//! Core domain models for graphk
//!
//! Templates (nodes, branches, pipelines and their gates) are immutable once
//! built and shared between sessions; the per-run state lives in
//! [`crate::execution`].

pub mod branch;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod gate;
pub mod node;
pub mod pipeline;
pub mod state;

pub use branch::{BranchNode, SelectionStrategy};
pub use context::{Context, Extensions};
pub use descriptor::{Descriptor, GateDescriptor};
pub use error::{ErrorKind, GraphError, PredicateError, TaskError};
pub use gate::{Gate, GateStrategy, Predicate};
pub use node::{LeafNode, Node, NodeAttrs, StepStream, Task};
pub use pipeline::Pipeline;
pub use state::{Failure, LogEntry, NodeState, SessionStatus};
