//! Context mappings seen by gates and tasks

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extension attributes attached to a node
///
/// The core never interprets these keys; each task kind documents the keys it
/// recognizes.
pub type Extensions = Map<String, Value>;

/// A string-keyed mapping of JSON values
///
/// Used both for the read-only static context of a node and for the mutable
/// per-run context owned by a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    /// Create a new empty context
    pub fn new() -> Self {
        Self { values: Map::new() }
    }

    /// Set a value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style `set`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Record the result of a node under `steps.<id>.output`
    pub fn set_output(&mut self, node_id: &str, value: Value) {
        self.values.insert(output_key(node_id), value);
    }

    /// Get the result a node published
    pub fn output(&self, node_id: &str) -> Option<&Value> {
        self.values.get(&output_key(node_id))
    }

    /// Return a new context with `overlay` applied on top of this one
    ///
    /// Keys present in both take the overlay's value.
    pub fn merged_with(&self, overlay: &Context) -> Context {
        let mut values = self.values.clone();
        for (key, value) in &overlay.values {
            values.insert(key.clone(), value.clone());
        }
        Context { values }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

fn output_key(node_id: &str) -> String {
    format!("steps.{}.output", node_id)
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut ctx = Context::new();
        for (key, value) in iter {
            ctx.set(key, value);
        }
        ctx
    }
}
