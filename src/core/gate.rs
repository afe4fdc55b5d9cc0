//! Gate model - boolean combinator over context predicates

use crate::core::{context::Context, error::PredicateError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Predicate function evaluated by a gate
pub type Predicate = Arc<dyn Fn(&Context) -> Result<bool, PredicateError> + Send + Sync>;

/// How a gate combines the results of its predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GateStrategy {
    /// Every predicate must hold (logical AND)
    AllMatch,
    /// At least one predicate must hold (logical OR)
    AnyMatch,
    /// No predicate may hold (logical NOR)
    NoneMatch,
    /// A strategy name that was not understood; always evaluates to false
    Unrecognized(String),
}

impl GateStrategy {
    pub fn name(&self) -> &str {
        match self {
            GateStrategy::AllMatch => "all",
            GateStrategy::AnyMatch => "any",
            GateStrategy::NoneMatch => "none",
            GateStrategy::Unrecognized(raw) => raw,
        }
    }
}

impl Default for GateStrategy {
    fn default() -> Self {
        GateStrategy::AllMatch
    }
}

impl From<&str> for GateStrategy {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "all" | "all_match" => GateStrategy::AllMatch,
            "any" | "any_match" => GateStrategy::AnyMatch,
            "none" | "none_match" => GateStrategy::NoneMatch,
            _ => GateStrategy::Unrecognized(raw.to_string()),
        }
    }
}

impl From<String> for GateStrategy {
    fn from(raw: String) -> Self {
        GateStrategy::from(raw.as_str())
    }
}

impl From<GateStrategy> for String {
    fn from(strategy: GateStrategy) -> Self {
        strategy.name().to_string()
    }
}

#[derive(Clone)]
struct Check {
    label: String,
    predicate: Predicate,
}

/// Boolean combinator evaluating labelled predicates against a context
///
/// Every predicate runs on each assessment, so predicates must be
/// side-effect free or idempotent.
#[derive(Clone)]
pub struct Gate {
    id: Option<String>,
    strategy: GateStrategy,
    checks: Vec<Check>,
}

impl Gate {
    pub fn new(strategy: GateStrategy) -> Self {
        Self {
            id: None,
            strategy,
            checks: Vec::new(),
        }
    }

    pub fn all() -> Self {
        Self::new(GateStrategy::AllMatch)
    }

    pub fn any() -> Self {
        Self::new(GateStrategy::AnyMatch)
    }

    pub fn none() -> Self {
        Self::new(GateStrategy::NoneMatch)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add an infallible predicate
    pub fn check<F>(self, label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.try_check(label, move |ctx| Ok(predicate(ctx)))
    }

    /// Add a predicate that may fail to evaluate
    pub fn try_check<F>(mut self, label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Context) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        self.checks.push(Check {
            label: label.into(),
            predicate: Arc::new(predicate),
        });
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn strategy(&self) -> &GateStrategy {
        &self.strategy
    }

    /// Labels of the predicates, in evaluation order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|c| c.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Evaluate the gate against a context
    pub fn assess(&self, context: &Context) -> Result<bool, PredicateError> {
        // Run every predicate before combining
        let results: Vec<Result<bool, PredicateError>> = self
            .checks
            .iter()
            .map(|check| (check.predicate)(context))
            .collect();

        let mut matched = 0;
        for result in results {
            if result? {
                matched += 1;
            }
        }

        Ok(match self.strategy {
            GateStrategy::AllMatch => matched == self.checks.len(),
            GateStrategy::AnyMatch => matched > 0,
            GateStrategy::NoneMatch => matched == 0,
            GateStrategy::Unrecognized(_) => false,
        })
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("id", &self.id)
            .field("strategy", &self.strategy)
            .field("checks", &self.labels().collect::<Vec<_>>())
            .finish()
    }
}
