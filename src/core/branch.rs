//! Branch node - resolves one of several candidates at runtime

use crate::core::{
    context::Context,
    descriptor::Descriptor,
    error::{GraphError, Result},
    node::{Node, NodeAttrs, StepStream},
};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Strategy for picking one candidate among the valid ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// First valid candidate in definition order
    First,
    /// Uniformly random valid candidate
    Random,
    /// Valid candidate with the highest weight, earliest on ties
    Best,
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        SelectionStrategy::First
    }
}

/// A node that owns several candidate children and selects exactly one
#[derive(Debug, Clone)]
pub struct BranchNode {
    pub(crate) attrs: NodeAttrs,
    strategy: SelectionStrategy,
    candidates: Vec<Node>,
    seed: Option<u64>,
}

impl BranchNode {
    pub fn new(id: impl Into<String>, strategy: SelectionStrategy, candidates: Vec<Node>) -> Self {
        Self {
            attrs: NodeAttrs::new(id),
            strategy,
            candidates,
            seed: None,
        }
    }

    /// Fix the random source so `Random` selection is reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn id(&self) -> &str {
        &self.attrs.id
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn candidates(&self) -> &[Node] {
        &self.candidates
    }

    pub async fn ping(&self) -> bool {
        join_all(self.candidates.iter().map(|node| node.ping()))
            .await
            .into_iter()
            .all(|healthy| healthy)
    }

    pub fn info(&self) -> Value {
        serde_json::to_value(self.describe()).unwrap_or(Value::Null)
    }

    /// Branches are never stepped; call [`BranchNode::select`] and step the choice
    pub fn step(&self, _context: &Context) -> Result<StepStream> {
        Err(GraphError::InvalidOperation(format!(
            "step() is not valid on branch '{}'; select a candidate instead",
            self.id()
        )))
    }

    /// Select a candidate, assessing each condition against the candidate's own context
    ///
    /// Returns `Ok(None)` when no candidate is valid.
    pub fn select(&self) -> Result<Option<&Node>> {
        let mut rng = self.seeded_rng().unwrap_or_else(StdRng::from_entropy);
        let index = self.select_index(None, &mut rng)?;
        Ok(index.map(|i| &self.candidates[i]))
    }

    /// Select a candidate, overlaying `run_context` on each candidate's context
    ///
    /// A branch with its own seed ignores `rng` and uses a generator seeded
    /// afresh on every call.
    pub fn select_with<R: Rng + ?Sized>(
        &self,
        run_context: &Context,
        rng: &mut R,
    ) -> Result<Option<usize>> {
        match self.seeded_rng() {
            Some(mut seeded) => self.select_index(Some(run_context), &mut seeded),
            None => self.select_index(Some(run_context), rng),
        }
    }

    fn seeded_rng(&self) -> Option<StdRng> {
        self.seed.map(StdRng::seed_from_u64)
    }

    fn select_index<R: Rng + ?Sized>(
        &self,
        run_context: Option<&Context>,
        rng: &mut R,
    ) -> Result<Option<usize>> {
        if self.candidates.is_empty() {
            return Err(GraphError::InvalidOperation(format!(
                "select() on branch '{}' with no candidates",
                self.id()
            )));
        }

        let mut valid = Vec::new();
        for (index, candidate) in self.candidates.iter().enumerate() {
            let context = match run_context {
                Some(run) => candidate.merged_context(run),
                None => candidate.context().as_ref().clone(),
            };
            if candidate.is_open(&context)? {
                valid.push(index);
            }
        }

        if valid.is_empty() {
            return Ok(None);
        }

        let chosen = match self.strategy {
            SelectionStrategy::First => valid[0],
            SelectionStrategy::Random => *valid.choose(rng).unwrap_or(&valid[0]),
            SelectionStrategy::Best => {
                let mut best = valid[0];
                for &index in &valid[1..] {
                    if weight_of(&self.candidates[index]) > weight_of(&self.candidates[best]) {
                        best = index;
                    }
                }
                best
            }
        };

        Ok(Some(chosen))
    }

    pub fn describe(&self) -> Descriptor {
        Descriptor::for_branch(self)
    }
}

fn weight_of(node: &Node) -> i64 {
    node.weight().unwrap_or(0)
}
