use tracing::warn;

use super::{OperationContext, OperationOutput};
use crate::domain::errors::CapabilityError;
use crate::domain::models::ThoughtState;

/// Merge each consecutive group of `num_to_combine` inputs into one state.
///
/// A trailing group of one is forwarded unchanged. A group whose merge keeps
/// failing after the configured attempts is dropped.
pub(super) async fn aggregate(
    ctx: &mut OperationContext<'_>,
    inputs: Vec<ThoughtState>,
    num_to_combine: usize,
) -> OperationOutput {
    let mut merged = Vec::with_capacity(inputs.len().div_ceil(num_to_combine.max(1)));

    for group in inputs.chunks(num_to_combine.max(1)) {
        if let [single] = group {
            merged.push(single.clone());
            continue;
        }
        match aggregate_with_retry(ctx, group).await {
            Ok(state) => merged.push(state),
            Err(CapabilityError::BudgetExhausted { .. }) => return OperationOutput::exhausted(merged),
            Err(e) => warn!(group = group.len(), error = %e, "aggregation gave up on group"),
        }
    }

    OperationOutput::complete(merged)
}

async fn aggregate_with_retry(
    ctx: &mut OperationContext<'_>,
    group: &[ThoughtState],
) -> Result<ThoughtState, CapabilityError> {
    let mut last_error = CapabilityError::Failed("no attempts configured".to_string());
    for _ in 0..ctx.attempts() {
        match ctx.aggregate(group).await {
            Ok(state) => return Ok(state),
            Err(e @ CapabilityError::BudgetExhausted { .. }) => return Err(e),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}
