//! `emit` - yields configured values, optionally failing afterwards

use crate::core::{
    context::{Context, Extensions},
    error::TaskError,
    node::{StepStream, Task},
};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Settings read from a node's extension attributes
///
/// ```yaml
/// - id: fetch
///   kind: emit
///   values: [1, 2, 3]
///   delay_ms: 50        # pause before each value
///   fail_with: "boom"   # fail after the values
///   healthy: false      # ping result
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitTask {
    #[serde(default)]
    pub values: Vec<Value>,

    #[serde(default)]
    pub delay_ms: Option<u64>,

    #[serde(default)]
    pub fail_with: Option<String>,

    #[serde(default = "default_healthy")]
    pub healthy: bool,
}

fn default_healthy() -> bool {
    true
}

impl EmitTask {
    pub const KIND: &'static str = "emit";

    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            delay_ms: None,
            fail_with: None,
            healthy: true,
        }
    }

    /// Fail with `message` once all values are yielded
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn from_extensions(extensions: &Extensions) -> Result<Self> {
        serde_json::from_value(Value::Object(extensions.clone()))
            .context("Invalid settings for task kind 'emit'")
    }
}

#[async_trait]
impl Task for EmitTask {
    async fn ping(&self) -> bool {
        self.healthy
    }

    fn info(&self) -> Value {
        serde_json::json!({
            "kind": Self::KIND,
            "values": self.values,
            "fails": self.fail_with.is_some(),
        })
    }

    fn step(&self, _context: &Context) -> StepStream {
        let delay = self.delay_ms.map(Duration::from_millis);
        let values = stream::iter(self.values.clone()).then(move |value| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(value)
        });
        let failure = stream::iter(self.fail_with.clone().map(|m| Err(TaskError::new(m))));
        values.chain(failure).boxed()
    }
}
