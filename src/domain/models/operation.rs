//! Operation domain models.
//!
//! An operation is the transform attached to one graph node. The parameters
//! live here; the behaviour lives in `services::operations`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::Scorer;

/// Kind of operation, as written into run artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Generate,
    Score,
    KeepBestN,
    Aggregate,
    DGenerateScore,
    DAggregate,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Score => "score",
            Self::KeepBestN => "keep_best_n",
            Self::Aggregate => "aggregate",
            Self::DGenerateScore => "d_generate_score",
            Self::DAggregate => "d_aggregate",
        }
    }

    /// Whether executing this kind invokes the language model.
    pub const fn invokes_language_model(self) -> bool {
        matches!(
            self,
            Self::Generate | Self::Aggregate | Self::DGenerateScore | Self::DAggregate
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One graph-node transform and its parameters.
#[derive(Clone)]
pub enum Operation {
    /// Draw up to `branch_factor` sibling candidates per input.
    Generate {
        required_predecessors: usize,
        branch_factor: usize,
    },
    /// Attach scores, independently or jointly per batch.
    Score {
        batch_size: usize,
        combined: bool,
        scorer: Arc<dyn Scorer>,
    },
    /// Keep the `n` best inputs by score.
    KeepBestN { n: usize, highest_is_best: bool },
    /// Merge every `num_to_combine` inputs into one state.
    Aggregate { num_to_combine: usize },
    /// Generate one candidate at a time until one scores `>= threshold`.
    DGenerateScore {
        required_predecessors: usize,
        branch_factor: usize,
        scorer: Arc<dyn Scorer>,
        threshold: f64,
    },
    /// Aggregate a group only when its best score is between the thresholds.
    DAggregate {
        num_to_combine: usize,
        scorer: Arc<dyn Scorer>,
        threshold_high: f64,
        threshold_low: f64,
    },
}

fn require_positive(name: &str, value: usize) -> DomainResult<()> {
    if value == 0 {
        return Err(DomainError::InvalidParameter(format!(
            "{name} must be at least 1"
        )));
    }
    Ok(())
}

fn require_finite(name: &str, value: f64) -> DomainResult<()> {
    if !value.is_finite() {
        return Err(DomainError::InvalidParameter(format!(
            "{name} must be finite, got {value}"
        )));
    }
    Ok(())
}

impl Operation {
    pub fn generate(required_predecessors: usize, branch_factor: usize) -> DomainResult<Self> {
        require_positive("required_predecessors", required_predecessors)?;
        require_positive("branch_factor", branch_factor)?;
        Ok(Self::Generate {
            required_predecessors,
            branch_factor,
        })
    }

    pub fn score(batch_size: usize, combined: bool, scorer: Arc<dyn Scorer>) -> DomainResult<Self> {
        require_positive("batch_size", batch_size)?;
        Ok(Self::Score {
            batch_size,
            combined,
            scorer,
        })
    }

    pub fn keep_best_n(n: usize, highest_is_best: bool) -> DomainResult<Self> {
        require_positive("n", n)?;
        Ok(Self::KeepBestN { n, highest_is_best })
    }

    pub fn aggregate(num_to_combine: usize) -> DomainResult<Self> {
        require_positive("num_to_combine", num_to_combine)?;
        Ok(Self::Aggregate { num_to_combine })
    }

    pub fn d_generate_score(
        required_predecessors: usize,
        branch_factor: usize,
        scorer: Arc<dyn Scorer>,
        threshold: f64,
    ) -> DomainResult<Self> {
        require_positive("required_predecessors", required_predecessors)?;
        require_positive("branch_factor", branch_factor)?;
        require_finite("threshold", threshold)?;
        Ok(Self::DGenerateScore {
            required_predecessors,
            branch_factor,
            scorer,
            threshold,
        })
    }

    pub fn d_aggregate(
        num_to_combine: usize,
        scorer: Arc<dyn Scorer>,
        threshold_high: f64,
        threshold_low: f64,
    ) -> DomainResult<Self> {
        require_positive("num_to_combine", num_to_combine)?;
        require_finite("threshold_high", threshold_high)?;
        require_finite("threshold_low", threshold_low)?;
        if threshold_low > threshold_high {
            // The high gate is checked first, so every group is forwarded unmerged.
            tracing::warn!(
                threshold_high,
                threshold_low,
                "d_aggregate low threshold exceeds high threshold; aggregation will never run"
            );
        }
        Ok(Self::DAggregate {
            num_to_combine,
            scorer,
            threshold_high,
            threshold_low,
        })
    }

    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Generate { .. } => OperationKind::Generate,
            Self::Score { .. } => OperationKind::Score,
            Self::KeepBestN { .. } => OperationKind::KeepBestN,
            Self::Aggregate { .. } => OperationKind::Aggregate,
            Self::DGenerateScore { .. } => OperationKind::DGenerateScore,
            Self::DAggregate { .. } => OperationKind::DAggregate,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate {
                required_predecessors,
                branch_factor,
            } => f
                .debug_struct("Generate")
                .field("required_predecessors", required_predecessors)
                .field("branch_factor", branch_factor)
                .finish(),
            Self::Score {
                batch_size,
                combined,
                scorer,
            } => f
                .debug_struct("Score")
                .field("batch_size", batch_size)
                .field("combined", combined)
                .field("scorer", &scorer.name())
                .finish(),
            Self::KeepBestN { n, highest_is_best } => f
                .debug_struct("KeepBestN")
                .field("n", n)
                .field("highest_is_best", highest_is_best)
                .finish(),
            Self::Aggregate { num_to_combine } => f
                .debug_struct("Aggregate")
                .field("num_to_combine", num_to_combine)
                .finish(),
            Self::DGenerateScore {
                required_predecessors,
                branch_factor,
                scorer,
                threshold,
            } => f
                .debug_struct("DGenerateScore")
                .field("required_predecessors", required_predecessors)
                .field("branch_factor", branch_factor)
                .field("scorer", &scorer.name())
                .field("threshold", threshold)
                .finish(),
            Self::DAggregate {
                num_to_combine,
                scorer,
                threshold_high,
                threshold_low,
            } => f
                .debug_struct("DAggregate")
                .field("num_to_combine", num_to_combine)
                .field("scorer", &scorer.name())
                .field("threshold_high", threshold_high)
                .field("threshold_low", threshold_low)
                .finish(),
        }
    }
}
