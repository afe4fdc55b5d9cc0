//! Task implementations and the registry that maps configured kinds to them

pub mod emit;

pub use emit::EmitTask;

use crate::core::{context::Extensions, node::Task};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a task from the extension attributes of a configured node
pub type TaskFactory = Arc<dyn Fn(&Extensions) -> Result<Arc<dyn Task>> + Send + Sync>;

/// Task registry - resolves the `kind` of a configured leaf to a task
#[derive(Clone, Default)]
pub struct TaskRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in kinds (`emit`)
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(EmitTask::KIND, |extensions| {
            Ok(Arc::new(EmitTask::from_extensions(extensions)?) as Arc<dyn Task>)
        });
        registry
    }

    /// Register a factory, replacing any previous one for `kind`
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Extensions) -> Result<Arc<dyn Task>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build a task of `kind`
    pub fn build(&self, kind: &str, extensions: &Extensions) -> Result<Arc<dyn Task>> {
        match self.factories.get(kind) {
            Some(factory) => factory(extensions),
            None => anyhow::bail!(
                "Unknown task kind '{}' (registered: {})",
                kind,
                self.kinds().join(", ")
            ),
        }
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}
