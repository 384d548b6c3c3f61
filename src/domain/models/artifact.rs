//! Persisted run artifact.
//!
//! One artifact is written per (method, variant, sample). It is a JSON array
//! with one record per executed operation, in execution order, followed by a
//! trailing usage summary. Downstream analysis indexes it from the end
//! (`[-1]` summary, `[-2]` final scored thoughts), so the summary must stay
//! last.

use serde::{Deserialize, Serialize};

use super::operation::OperationKind;
use super::thought::ThoughtState;
use super::usage::TokenUsage;

/// Output of one executed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation: OperationKind,
    pub thoughts: Vec<ThoughtState>,
    /// Per-thought scored flags, present when any thought is scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scored: Option<Vec<bool>>,
    /// Per-thought scores (0.0 when unscored), present when any thought is scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<f64>>,
}

impl OperationRecord {
    pub fn new(operation: OperationKind, thoughts: Vec<ThoughtState>) -> Self {
        let any_scored = thoughts.iter().any(ThoughtState::is_scored);
        let (scored, scores) = if any_scored {
            (
                Some(thoughts.iter().map(ThoughtState::is_scored).collect()),
                Some(thoughts.iter().map(ThoughtState::score_or_zero).collect()),
            )
        } else {
            (None, None)
        };
        Self {
            operation,
            thoughts,
            scored,
            scores,
        }
    }
}

/// One element of the serialized artifact array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactEntry {
    Operation(OperationRecord),
    Summary(TokenUsage),
}

/// Operation records plus the usage summary of one graph execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ArtifactEntry>", into = "Vec<ArtifactEntry>")]
pub struct RunArtifact {
    pub records: Vec<OperationRecord>,
    pub summary: TokenUsage,
}

impl RunArtifact {
    /// Records of score operations, in execution order.
    pub fn score_records(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records
            .iter()
            .filter(|r| r.operation == OperationKind::Score)
    }

    /// Thoughts of the last executed operation.
    pub fn final_thoughts(&self) -> &[ThoughtState] {
        self.records.last().map_or(&[], |r| r.thoughts.as_slice())
    }
}

impl From<RunArtifact> for Vec<ArtifactEntry> {
    fn from(artifact: RunArtifact) -> Self {
        let mut entries: Self = artifact
            .records
            .into_iter()
            .map(ArtifactEntry::Operation)
            .collect();
        entries.push(ArtifactEntry::Summary(artifact.summary));
        entries
    }
}

impl TryFrom<Vec<ArtifactEntry>> for RunArtifact {
    type Error = String;

    fn try_from(mut entries: Vec<ArtifactEntry>) -> Result<Self, Self::Error> {
        let summary = match entries.pop() {
            Some(ArtifactEntry::Summary(summary)) => summary,
            Some(ArtifactEntry::Operation(_)) => {
                return Err("artifact must end with a usage summary".to_string())
            }
            None => return Err("artifact is empty".to_string()),
        };

        let records = entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| match entry {
                ArtifactEntry::Operation(record) => Ok(record),
                ArtifactEntry::Summary(_) => Err(format!(
                    "unexpected usage summary at position {idx}"
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { records, summary })
    }
}
