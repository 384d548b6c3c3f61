use super::OperationContext;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ThoughtState;
use crate::domain::ports::Scorer;

/// Attach a score to every input, preserving order.
///
/// In combined mode the inputs are scored jointly per chunk of `batch_size`;
/// each state then carries the whole chunk's scores next to its own. A scorer
/// that fails defaults its states to 0.0. A scorer that returns the wrong
/// number of scores is broken and fails the node.
pub(super) fn score(
    ctx: &mut OperationContext<'_>,
    inputs: &[ThoughtState],
    batch_size: usize,
    combined: bool,
    scorer: &dyn Scorer,
) -> DomainResult<Vec<ThoughtState>> {
    if !combined {
        return Ok(inputs.iter().map(|state| ctx.score(scorer, state)).collect());
    }

    let mut scored = Vec::with_capacity(inputs.len());
    for chunk in inputs.chunks(batch_size.max(1)) {
        let scores = match scorer.score_batch(chunk) {
            Ok(scores) if scores.len() == chunk.len() => scores,
            Ok(scores) => {
                return Err(DomainError::InvalidParameter(format!(
                    "scorer {} returned {} scores for {} states",
                    scorer.name(),
                    scores.len(),
                    chunk.len()
                )))
            }
            Err(e) => {
                ctx.scoring_failed(scorer, &e.to_string(), chunk.len());
                vec![0.0; chunk.len()]
            }
        };

        scored.extend(chunk.iter().zip(&scores).map(|(state, &value)| {
            let value = if value.is_finite() { value } else { 0.0 };
            state
                .with_batch_scores(value, scores.clone())
                .with_score_details(scorer.details(state))
        }));
    }
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted_language_model::ScriptedLanguageModel;
    use crate::domain::models::{Budget, ExecutorSettings};
    use crate::domain::ports::{FnScorer, PromptContext};
    use crate::services::operations::test_support::{parse_scorer, seed};

    struct LengthBatchScorer;

    impl Scorer for LengthBatchScorer {
        fn name(&self) -> &str {
            "length"
        }

        fn score(&self, state: &ThoughtState) -> anyhow::Result<f64> {
            Ok(state.current.len() as f64)
        }
    }

    struct ShortBatchScorer;

    impl Scorer for ShortBatchScorer {
        fn name(&self) -> &str {
            "short"
        }

        fn score(&self, _state: &ThoughtState) -> anyhow::Result<f64> {
            Ok(1.0)
        }

        fn score_batch(&self, _states: &[ThoughtState]) -> anyhow::Result<Vec<f64>> {
            Ok(vec![1.0])
        }
    }

    fn drafts(items: &[&str]) -> Vec<ThoughtState> {
        items.iter().map(|t| seed().with_current(*t)).collect()
    }

    #[tokio::test]
    async fn test_independent_scores_preserve_order() {
        let lm = ScriptedLanguageModel::new();
        let budget = Budget::new(1.0);
        let settings = ExecutorSettings::default();
        let mut ctx = OperationContext::new(&lm, &budget, &settings, PromptContext::default());

        let scored = score(&mut ctx, &drafts(&["0.1", "0.4", "0.3"]), 3, false, &parse_scorer()).unwrap();

        let scores: Vec<_> = scored.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![Some(0.1), Some(0.4), Some(0.3)]);
        assert!(scored.iter().all(|s| s.scores.is_none()));
    }

    #[tokio::test]
    async fn test_combined_scores_per_chunk() {
        let lm = ScriptedLanguageModel::new();
        let budget = Budget::new(1.0);
        let settings = ExecutorSettings::default();
        let mut ctx = OperationContext::new(&lm, &budget, &settings, PromptContext::default());

        let scored = score(&mut ctx, &drafts(&["a", "bb", "ccc"]), 2, true, &LengthBatchScorer).unwrap();

        assert_eq!(scored[0].scores, Some(vec![1.0, 2.0]));
        assert_eq!(scored[1].score, Some(2.0));
        assert_eq!(scored[2].scores, Some(vec![3.0]));
    }

    #[tokio::test]
    async fn test_failed_batch_defaults_to_zero() {
        let lm = ScriptedLanguageModel::new();
        let budget = Budget::new(1.0);
        let settings = ExecutorSettings::default();
        let mut ctx = OperationContext::new(&lm, &budget, &settings, PromptContext::default());
        let failing = FnScorer::new("failing", |_: &ThoughtState| anyhow::bail!("no reference"));

        let scored = score(&mut ctx, &drafts(&["a", "b"]), 2, true, &failing).unwrap();

        assert_eq!(scored[1].score, Some(0.0));
        assert_eq!(ctx.metrics().scoring_failures, 2);
    }

    #[tokio::test]
    async fn test_mismatched_batch_fails_node() {
        let lm = ScriptedLanguageModel::new();
        let budget = Budget::new(1.0);
        let settings = ExecutorSettings::default();
        let mut ctx = OperationContext::new(&lm, &budget, &settings, PromptContext::default());

        let result = score(&mut ctx, &drafts(&["a", "b"]), 2, true, &ShortBatchScorer);
        assert!(matches!(result, Err(DomainError::InvalidParameter(_))));
    }
}
