//! Scorer port - opaque quality score of a thought state.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::models::ThoughtState;

/// Component metrics a scorer may expose next to its headline score.
pub type ScoreDetails = BTreeMap<String, f64>;

/// Scores thought states. Higher is better for the built-in methods.
pub trait Scorer: Send + Sync {
    /// Scorer name for logs.
    fn name(&self) -> &str;

    /// Score one state.
    fn score(&self, state: &ThoughtState) -> anyhow::Result<f64>;

    /// Score a batch jointly, returning scores index-aligned to `states`.
    ///
    /// The default scores each state independently; scorers that rank
    /// candidates relative to each other override this.
    fn score_batch(&self, states: &[ThoughtState]) -> anyhow::Result<Vec<f64>> {
        states.iter().map(|state| self.score(state)).collect()
    }

    /// Optional component metrics for `state`.
    fn details(&self, _state: &ThoughtState) -> Option<ScoreDetails> {
        None
    }
}

/// Adapts a plain function into a [`Scorer`].
pub struct FnScorer<F> {
    name: String,
    func: F,
}

impl<F> FnScorer<F>
where
    F: Fn(&ThoughtState) -> anyhow::Result<f64> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnScorer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnScorer").field("name", &self.name).finish()
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: Fn(&ThoughtState) -> anyhow::Result<f64> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, state: &ThoughtState) -> anyhow::Result<f64> {
        (self.func)(state)
    }
}
