//! Unigram-overlap scorer.
//!
//! ROUGE-1 style F-measure between a draft and a reference text taken from
//! the state's provenance. The introduction is the intermediate reference
//! (available at inference time); the author abstract is the gold reference
//! used for final evaluation.

use anyhow::bail;
use std::collections::HashMap;

use crate::domain::models::ThoughtState;
use crate::domain::ports::{ScoreDetails, Scorer};

/// Which provenance text a draft is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceText {
    Introduction,
    Abstract,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Overlap {
    precision: f64,
    recall: f64,
    f_score: f64,
}

/// Scores drafts by unigram overlap with a reference.
#[derive(Debug, Clone)]
pub struct OverlapScorer {
    name: String,
    reference: ReferenceText,
}

impl OverlapScorer {
    pub fn new(reference: ReferenceText) -> Self {
        let name = match reference {
            ReferenceText::Introduction => "overlap_introduction",
            ReferenceText::Abstract => "overlap_abstract",
        };
        Self {
            name: name.to_string(),
            reference,
        }
    }

    fn reference<'a>(&self, state: &'a ThoughtState) -> &'a str {
        match self.reference {
            ReferenceText::Introduction => &state.provenance().origin_introduction,
            ReferenceText::Abstract => &state.provenance().origin_abstract,
        }
    }

    fn overlap(&self, state: &ThoughtState) -> anyhow::Result<Overlap> {
        let reference = tokens(self.reference(state));
        if reference.is_empty() {
            bail!("reference text is empty");
        }
        let candidate = tokens(&state.current);
        if candidate.is_empty() {
            return Ok(Overlap {
                precision: 0.0,
                recall: 0.0,
                f_score: 0.0,
            });
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in &reference {
            *counts.entry(token.as_str()).or_default() += 1;
        }
        let mut matched = 0usize;
        for token in &candidate {
            if let Some(count) = counts.get_mut(token.as_str()) {
                if *count > 0 {
                    *count -= 1;
                    matched += 1;
                }
            }
        }

        let precision = matched as f64 / candidate.len() as f64;
        let recall = matched as f64 / reference.len() as f64;
        let f_score = if matched == 0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Ok(Overlap {
            precision,
            recall,
            f_score,
        })
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Scorer for OverlapScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, state: &ThoughtState) -> anyhow::Result<f64> {
        Ok(self.overlap(state)?.f_score)
    }

    fn details(&self, state: &ThoughtState) -> Option<ScoreDetails> {
        let overlap = self.overlap(state).ok()?;
        Some(ScoreDetails::from([
            ("rouge_1_f_score".to_string(), overlap.f_score),
            ("rouge_1_precision".to_string(), overlap.precision),
            ("rouge_1_recall".to_string(), overlap.recall),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Provenance;

    fn state(reference: &str, draft: &str) -> ThoughtState {
        ThoughtState::seed(Provenance {
            origin_abstract: reference.to_string(),
            ..Provenance::default()
        })
        .with_current(draft)
    }

    #[test]
    fn test_identical_text_scores_one() {
        let scorer = OverlapScorer::new(ReferenceText::Abstract);
        let score = scorer.score(&state("Cells divide.", "cells DIVIDE")).unwrap();
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_overlap_details() {
        let scorer = OverlapScorer::new(ReferenceText::Abstract);
        let s = state("a b c d", "a b x");
        let details = scorer.details(&s).unwrap();

        assert!((details["rouge_1_precision"] - 2.0 / 3.0).abs() < 1e-12);
        assert!((details["rouge_1_recall"] - 0.5).abs() < 1e-12);
        assert!((scorer.score(&s).unwrap() - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_tokens_clipped() {
        let scorer = OverlapScorer::new(ReferenceText::Abstract);
        let details = scorer.details(&state("a b", "a a a a")).unwrap();
        assert!((details["rouge_1_precision"] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_missing_reference_fails() {
        let scorer = OverlapScorer::new(ReferenceText::Introduction);
        assert!(scorer.score(&state("abstract only", "draft")).is_err());
        assert!(scorer.details(&state("abstract only", "draft")).is_none());
    }
}
