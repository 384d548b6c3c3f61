//! Named graph methods.
//!
//! Each [`Method`] builds the operation graph it stands for. Intermediate
//! score nodes use the inference-time scorer; the terminal score node uses
//! the evaluation scorer, so every template ends with a single evaluated
//! state. Adaptive gates come from [`StageThresholds`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Operation, OperationGraph, StageThresholds};
use crate::domain::ports::Scorer;

const BRANCH_FACTOR: usize = 3;

/// A named graph-of-operations method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Single generation
    Io,
    /// Single generation with a reasoning prompt
    Cot,
    /// Three rounds of generate, score, keep best
    Tot,
    /// Generate, merge the best, then refine
    Got,
    /// `got` with score-gated generation and aggregation
    Dgot,
}

impl Method {
    pub const ALL: [Self; 5] = [Self::Io, Self::Cot, Self::Tot, Self::Got, Self::Dgot];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::Cot => "cot",
            Self::Tot => "tot",
            Self::Got => "got",
            Self::Dgot => "dgot",
        }
    }

    pub const fn is_adaptive(self) -> bool {
        matches!(self, Self::Dgot)
    }

    /// Build this method's graph.
    pub fn build(self, scorers: &ScorerSet, gates: &StageThresholds) -> DomainResult<OperationGraph> {
        match self {
            Self::Io | Self::Cot => single(scorers),
            Self::Tot => tree(scorers),
            Self::Got => merge_and_refine(scorers),
            Self::Dgot => gated_merge_and_refine(scorers, gates),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown method '{s}' (expected io, cot, tot, got or dgot)"))
    }
}

/// Scorers a template wires into its score nodes.
#[derive(Clone)]
pub struct ScorerSet {
    /// Scores intermediate candidates
    pub intermediate: Arc<dyn Scorer>,
    /// Scores the final output against the gold reference
    pub evaluation: Arc<dyn Scorer>,
}

impl fmt::Debug for ScorerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScorerSet")
            .field("intermediate", &self.intermediate.name())
            .field("evaluation", &self.evaluation.name())
            .finish()
    }
}

fn single(scorers: &ScorerSet) -> DomainResult<OperationGraph> {
    let mut graph = OperationGraph::new();
    graph.append(Operation::generate(1, 1)?);
    graph.append(Operation::score(1, false, scorers.evaluation.clone())?);
    Ok(graph)
}

fn tree(scorers: &ScorerSet) -> DomainResult<OperationGraph> {
    let mut graph = OperationGraph::new();
    graph.append(Operation::generate(1, BRANCH_FACTOR)?);
    graph.append(Operation::score(BRANCH_FACTOR, false, scorers.intermediate.clone())?);
    let mut best = graph.append(Operation::keep_best_n(1, true)?);

    for _ in 0..2 {
        graph.append(Operation::generate(1, BRANCH_FACTOR)?);
        graph.append(Operation::score(BRANCH_FACTOR, false, scorers.intermediate.clone())?);
        let next = graph.append(Operation::keep_best_n(1, true)?);
        graph.add_predecessor(next, best)?;
        best = next;
    }

    graph.append(Operation::score(1, false, scorers.evaluation.clone())?);
    Ok(graph)
}

fn merge_and_refine(scorers: &ScorerSet) -> DomainResult<OperationGraph> {
    let mut graph = OperationGraph::new();
    graph.append(Operation::generate(1, BRANCH_FACTOR)?);
    graph.append(Operation::score(BRANCH_FACTOR, false, scorers.intermediate.clone())?);
    let candidates = graph.append(Operation::keep_best_n(BRANCH_FACTOR, true)?);

    graph.append(Operation::aggregate(BRANCH_FACTOR)?);
    graph.append(Operation::score(BRANCH_FACTOR, false, scorers.intermediate.clone())?);
    let merged = graph.append(Operation::keep_best_n(1, true)?);
    graph.add_predecessor(merged, candidates)?;

    graph.append(Operation::generate(1, BRANCH_FACTOR)?);
    graph.append(Operation::score(BRANCH_FACTOR, false, scorers.intermediate.clone())?);
    let refined = graph.append(Operation::keep_best_n(1, true)?);
    graph.add_predecessor(refined, merged)?;

    graph.append(Operation::score(1, false, scorers.evaluation.clone())?);
    Ok(graph)
}

/// The aggregation gate forwards a group unmerged when it is already above
/// the aggregate-stage threshold or has not even reached the generate-stage
/// one.
fn gated_merge_and_refine(scorers: &ScorerSet, gates: &StageThresholds) -> DomainResult<OperationGraph> {
    let scorer = &scorers.intermediate;
    let mut graph = OperationGraph::new();
    graph.append(Operation::d_generate_score(1, BRANCH_FACTOR, scorer.clone(), gates.generate)?);
    graph.append(Operation::score(BRANCH_FACTOR, false, scorer.clone())?);
    let candidates = graph.append(Operation::keep_best_n(BRANCH_FACTOR, true)?);

    graph.append(Operation::d_aggregate(
        BRANCH_FACTOR,
        scorer.clone(),
        gates.aggregate,
        gates.generate,
    )?);
    graph.append(Operation::score(BRANCH_FACTOR, false, scorer.clone())?);
    let merged = graph.append(Operation::keep_best_n(1, true)?);
    graph.add_predecessor(merged, candidates)?;

    graph.append(Operation::d_generate_score(1, BRANCH_FACTOR, scorer.clone(), gates.refine)?);
    graph.append(Operation::score(BRANCH_FACTOR, false, scorer.clone())?);
    let refined = graph.append(Operation::keep_best_n(1, true)?);
    graph.add_predecessor(refined, merged)?;

    graph.append(Operation::score(1, false, scorers.evaluation.clone())?);
    Ok(graph)
}
