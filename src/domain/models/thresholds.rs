//! Score-gate threshold table.
//!
//! Gate thresholds are configuration data: a table keyed by
//! `(stage, percentile)` produced offline by the Gumbel calibrator and read
//! when building adaptive graphs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::CalibrationError;

/// Refinement stage a gate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// First round of candidate generation
    Generate,
    /// Merge of the best first-round candidates
    Aggregate,
    /// Final refinement round
    Refine,
}

impl Stage {
    pub const ALL: [Self; 3] = [Self::Generate, Self::Aggregate, Self::Refine];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generate => "generate",
            Self::Aggregate => "aggregate",
            Self::Refine => "refine",
        })
    }
}

/// One calibrated threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEntry {
    pub stage: Stage,
    pub percentile: f64,
    pub threshold: f64,
}

const PERCENTILE_TOLERANCE: f64 = 1e-9;

/// Thresholds keyed by `(stage, percentile)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdTable {
    entries: Vec<ThresholdEntry>,
}

impl Default for ThresholdTable {
    /// Table calibrated on the training split of the abstract corpus.
    fn default() -> Self {
        let mut table = Self::empty();
        for (percentile, values) in [
            (0.25, [0.38, 0.355, 0.35]),
            (0.5, [0.46, 0.42, 0.41]),
            (0.75, [0.56, 0.50, 0.49]),
        ] {
            for (stage, threshold) in Stage::ALL.into_iter().zip(values) {
                table.insert(stage, percentile, threshold);
            }
        }
        table
    }
}

impl ThresholdTable {
    pub const fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or replace the threshold for `(stage, percentile)`.
    pub fn insert(&mut self, stage: Stage, percentile: f64, threshold: f64) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.stage == stage && (e.percentile - percentile).abs() < PERCENTILE_TOLERANCE)
        {
            entry.threshold = threshold;
        } else {
            self.entries.push(ThresholdEntry {
                stage,
                percentile,
                threshold,
            });
        }
    }

    pub fn get(&self, stage: Stage, percentile: f64) -> Result<f64, CalibrationError> {
        self.entries
            .iter()
            .find(|e| e.stage == stage && (e.percentile - percentile).abs() < PERCENTILE_TOLERANCE)
            .map(|e| e.threshold)
            .ok_or_else(|| CalibrationError::MissingThreshold {
                stage: stage.to_string(),
                percentile,
            })
    }

    pub fn entries(&self) -> &[ThresholdEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The gate values one adaptive graph needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageThresholds {
    /// Early-exit gate of the first generation round
    pub generate: f64,
    /// "Already strong enough" gate of the aggregation step
    pub aggregate: f64,
    /// Early-exit gate of the refinement round
    pub refine: f64,
}

impl StageThresholds {
    /// Look up every stage at `percentile`.
    pub fn from_table(table: &ThresholdTable, percentile: f64) -> Result<Self, CalibrationError> {
        Ok(Self {
            generate: table.get(Stage::Generate, percentile)?,
            aggregate: table.get(Stage::Aggregate, percentile)?,
            refine: table.get(Stage::Refine, percentile)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_lookup() {
        let table = ThresholdTable::default();
        let gates = StageThresholds::from_table(&table, 0.25).unwrap();
        assert!((gates.generate - 0.38).abs() < f64::EPSILON);
        assert!((gates.aggregate - 0.355).abs() < f64::EPSILON);
        assert!((gates.refine - 0.35).abs() < f64::EPSILON);
        assert_eq!(table.entries().len(), 9);
    }

    #[test]
    fn test_insert_replaces() {
        let mut table = ThresholdTable::empty();
        table.insert(Stage::Refine, 0.5, 0.1);
        table.insert(Stage::Refine, 0.5, 0.2);
        assert_eq!(table.entries().len(), 1);
        assert!((table.get(Stage::Refine, 0.5).unwrap() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_entry() {
        let table = ThresholdTable::empty();
        assert!(matches!(
            table.get(Stage::Generate, 0.9),
            Err(CalibrationError::MissingThreshold { .. })
        ));
    }

    #[test]
    fn test_yaml_shape() {
        let mut table = ThresholdTable::empty();
        table.insert(Stage::Aggregate, 0.5, 0.42);
        let yaml = serde_yaml::to_string(&table).unwrap();
        assert!(yaml.contains("stage: aggregate"));
        let back: ThresholdTable = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, table);
    }
}
