//! Thought state domain model.
//!
//! A thought state is one candidate draft together with the read-only
//! provenance of the article it summarises and the annotations that scoring
//! operations attach to it. States flow along the operation graph; every
//! operation produces fresh copies, so a state handed to one successor is
//! never observed changing by another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only source material shared by every state derived from one sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Title of the source article
    pub origin_title: String,
    /// Author-written abstract (the gold summary)
    #[serde(default)]
    pub origin_abstract: String,
    /// Introduction section of the source article
    #[serde(default)]
    pub origin_introduction: String,
    /// Remaining body sections keyed by section title
    #[serde(default)]
    pub origin_info: BTreeMap<String, String>,
    /// Referenced works: title -> abstract
    #[serde(default)]
    pub reference_info: BTreeMap<String, String>,
    /// Name of the graph method this state is processed by
    #[serde(default)]
    pub method: String,
}

/// One candidate draft flowing through the operation graph.
///
/// Serializes to a flat object: provenance fields, `current`, and whichever
/// annotations are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtState {
    #[serde(flatten)]
    provenance: Arc<Provenance>,

    /// The working draft
    #[serde(default)]
    pub current: String,

    /// Score attached by a scoring operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Index-aligned scores of the batch this state was jointly scored with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<f64>>,

    /// Component metrics reported by the scorer (e.g. precision / recall)
    #[serde(
        default,
        rename = "rouge",
        skip_serializing_if = "Option::is_none"
    )]
    pub score_details: Option<BTreeMap<String, f64>>,
}

impl ThoughtState {
    /// Create the seed state of a graph execution with an empty draft.
    pub fn seed(provenance: Provenance) -> Self {
        Self {
            provenance: Arc::new(provenance),
            current: String::new(),
            score: None,
            scores: None,
            score_details: None,
        }
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Derive a new unscored state carrying `text` as its draft.
    #[must_use]
    pub fn with_current(&self, text: impl Into<String>) -> Self {
        Self {
            provenance: Arc::clone(&self.provenance),
            current: text.into(),
            score: None,
            scores: None,
            score_details: None,
        }
    }

    /// Copy of this state annotated with `score`.
    #[must_use]
    pub fn with_score(&self, score: f64) -> Self {
        let mut next = self.clone();
        next.score = Some(score);
        next
    }

    /// Copy of this state annotated with its own score and the batch's scores.
    #[must_use]
    pub fn with_batch_scores(&self, score: f64, scores: Vec<f64>) -> Self {
        let mut next = self.clone();
        next.score = Some(score);
        next.scores = Some(scores);
        next
    }

    /// Copy of this state with scorer component metrics attached.
    #[must_use]
    pub fn with_score_details(mut self, details: Option<BTreeMap<String, f64>>) -> Self {
        if details.is_some() {
            self.score_details = details;
        }
        self
    }

    pub const fn is_scored(&self) -> bool {
        self.score.is_some()
    }

    /// Score used for ranking; unscored states rank as 0.0.
    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provenance() -> Provenance {
        Provenance {
            origin_title: "Title".to_string(),
            origin_abstract: "Gold abstract".to_string(),
            origin_introduction: "Intro".to_string(),
            origin_info: BTreeMap::from([("Methods".to_string(), "We did".to_string())]),
            reference_info: BTreeMap::new(),
            method: "got".to_string(),
        }
    }

    #[test]
    fn test_with_current_clears_annotations() {
        let seed = ThoughtState::seed(provenance());
        let scored = seed.with_current("draft").with_batch_scores(0.4, vec![0.4, 0.1]);
        let next = scored.with_current("merged");

        assert_eq!(next.current, "merged");
        assert!(next.score.is_none());
        assert!(next.scores.is_none());
        assert_eq!(next.provenance(), scored.provenance());
    }

    #[test]
    fn test_copies_leave_original_untouched() {
        let state = ThoughtState::seed(provenance()).with_current("a");
        let scored = state.with_score(0.9);

        assert!(state.score.is_none());
        assert_eq!(scored.score, Some(0.9));
    }

    #[test]
    fn test_serializes_flat() {
        let state = ThoughtState::seed(provenance())
            .with_current("draft")
            .with_score(0.5)
            .with_score_details(Some(BTreeMap::from([(
                "rouge_1_f_score".to_string(),
                0.5,
            )])));
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["origin_title"], "Title");
        assert_eq!(value["current"], "draft");
        assert_eq!(value["score"], 0.5);
        assert_eq!(value["rouge"]["rouge_1_f_score"], 0.5);
        assert!(value.get("scores").is_none());

        let back: ThoughtState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_score_or_zero() {
        let state = ThoughtState::seed(provenance());
        assert!((state.score_or_zero() - 0.0).abs() < f64::EPSILON);
        assert!((state.with_score(0.3).score_or_zero() - 0.3).abs() < f64::EPSILON);
    }
}
