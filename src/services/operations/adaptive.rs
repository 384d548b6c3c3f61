//! Score-gated operations.
//!
//! These are the adaptive variants of generate and aggregate: they score as
//! they go and spend invocations only while the best candidate is still below
//! a calibrated threshold.

use tracing::{debug, warn};

use super::keep_best::best_index;
use super::{OperationContext, OperationOutput};
use crate::domain::errors::CapabilityError;
use crate::domain::models::ThoughtState;
use crate::domain::ports::Scorer;

/// Draw candidates one at a time, stopping at the first that scores at least
/// `threshold`.
///
/// A failed draw still consumes one of the `branch_factor` slots.
pub(super) async fn d_generate_score(
    ctx: &mut OperationContext<'_>,
    inputs: &[ThoughtState],
    branch_factor: usize,
    scorer: &dyn Scorer,
    threshold: f64,
) -> OperationOutput {
    let mut produced = Vec::with_capacity(inputs.len() * branch_factor);

    for input in inputs {
        for draw in 1..=branch_factor {
            let candidate = match ctx.generate(input, 1).await {
                Ok(mut states) if !states.is_empty() => states.swap_remove(0),
                Ok(_) => {
                    warn!(draw, "adaptive generation returned no candidate");
                    continue;
                }
                Err(CapabilityError::BudgetExhausted { .. }) => {
                    return OperationOutput::exhausted(produced);
                }
                Err(e) => {
                    warn!(draw, error = %e, "adaptive generation draw failed");
                    continue;
                }
            };

            let scored = ctx.score(scorer, &candidate);
            let passed = scored.score_or_zero() >= threshold;
            produced.push(scored);

            if passed {
                if draw < branch_factor {
                    debug!(draw, branch_factor, threshold, "generation gate passed early");
                    ctx.metrics_mut().gate_exits += 1;
                }
                break;
            }
        }
    }

    OperationOutput::complete(produced)
}

/// Aggregate each group only when its best input is neither strong enough to
/// keep (`>= threshold_high`) nor too weak to improve (`<= threshold_low`).
///
/// Every input is scored; a skipped group forwards its best input. A group is
/// merged with at most one invocation, and falls back to its best input when
/// that invocation fails.
pub(super) async fn d_aggregate(
    ctx: &mut OperationContext<'_>,
    inputs: Vec<ThoughtState>,
    num_to_combine: usize,
    scorer: &dyn Scorer,
    threshold_high: f64,
    threshold_low: f64,
) -> OperationOutput {
    let mut produced = Vec::with_capacity(inputs.len().div_ceil(num_to_combine.max(1)));

    for group in inputs.chunks(num_to_combine.max(1)) {
        let scored: Vec<ThoughtState> = group.iter().map(|s| ctx.score(scorer, s)).collect();
        let Some(best) = best_index(&scored) else {
            continue;
        };
        let best = scored[best].clone();
        let best_score = best.score_or_zero();

        if scored.len() == 1 {
            produced.push(best);
            continue;
        }
        if best_score >= threshold_high || best_score <= threshold_low {
            debug!(best_score, threshold_high, threshold_low, "aggregation skipped by gate");
            ctx.metrics_mut().skipped_aggregations += 1;
            produced.push(best);
            continue;
        }

        match ctx.aggregate(&scored).await {
            Ok(merged) => produced.push(merged),
            Err(CapabilityError::BudgetExhausted { .. }) => {
                return OperationOutput::exhausted(produced);
            }
            Err(e) => {
                warn!(error = %e, "adaptive aggregation failed, forwarding best input");
                produced.push(best);
            }
        }
    }

    OperationOutput::complete(produced)
}
