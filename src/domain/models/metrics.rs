//! Per-execution diagnostic counters.
//!
//! One `RunMetrics` is owned by each graph execution and merged by the
//! caller, so concurrent executions never share counters.

use serde::{Deserialize, Serialize};

/// Counters collected while executing one graph (or merged over many).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Graph executions folded into this value
    pub executions: u64,
    /// Executions halted early by budget depletion
    pub partial_executions: u64,
    /// Language-model invocations attempted
    pub invocations: u64,
    /// Invocations that failed or timed out
    pub failed_invocations: u64,
    /// States whose score defaulted to 0.0 because the scorer failed
    pub scoring_failures: u64,
    /// Adaptive generations that stopped before their branch factor
    pub gate_exits: u64,
    /// Adaptive aggregations that forwarded the best input instead of merging
    pub skipped_aggregations: u64,
    /// Wall-clock seconds spent executing
    pub elapsed_secs: f64,
}

impl RunMetrics {
    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.executions += other.executions;
        self.partial_executions += other.partial_executions;
        self.invocations += other.invocations;
        self.failed_invocations += other.failed_invocations;
        self.scoring_failures += other.scoring_failures;
        self.gate_exits += other.gate_exits;
        self.skipped_aggregations += other.skipped_aggregations;
        self.elapsed_secs += other.elapsed_secs;
    }

    /// Mean seconds per execution, 0.0 when nothing ran.
    pub fn mean_elapsed_secs(&self) -> f64 {
        if self.executions == 0 {
            return 0.0;
        }
        self.elapsed_secs / self.executions as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_mean() {
        let mut total = RunMetrics::default();
        assert!((total.mean_elapsed_secs() - 0.0).abs() < f64::EPSILON);

        total.merge(&RunMetrics {
            executions: 1,
            invocations: 4,
            elapsed_secs: 2.0,
            ..Default::default()
        });
        total.merge(&RunMetrics {
            executions: 1,
            invocations: 2,
            scoring_failures: 1,
            elapsed_secs: 4.0,
            ..Default::default()
        });

        assert_eq!(total.executions, 2);
        assert_eq!(total.invocations, 6);
        assert_eq!(total.scoring_failures, 1);
        assert!((total.mean_elapsed_secs() - 3.0).abs() < f64::EPSILON);
    }
}
