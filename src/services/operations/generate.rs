use tracing::{debug, warn};

use super::{OperationContext, OperationOutput};
use crate::domain::errors::CapabilityError;
use crate::domain::models::ThoughtState;

/// Draw up to `branch_factor` candidates for each input.
///
/// Failed requests are retried at half the size, up to the configured number
/// of attempts per input; whatever was produced by then is kept. Budget
/// exhaustion stops the whole node.
pub(super) async fn generate(
    ctx: &mut OperationContext<'_>,
    inputs: &[ThoughtState],
    branch_factor: usize,
) -> OperationOutput {
    let mut produced = Vec::with_capacity(inputs.len() * branch_factor);

    for input in inputs {
        match generate_with_retry(ctx, input, branch_factor, &mut produced).await {
            Ok(()) => {}
            Err(CapabilityError::BudgetExhausted { remaining }) => {
                debug!(remaining, produced = produced.len(), "generation halted by budget");
                return OperationOutput::exhausted(produced);
            }
            Err(e) => {
                warn!(error = %e, "generation gave up on input");
            }
        }
    }

    OperationOutput::complete(produced)
}

async fn generate_with_retry(
    ctx: &mut OperationContext<'_>,
    input: &ThoughtState,
    branch_factor: usize,
    produced: &mut Vec<ThoughtState>,
) -> Result<(), CapabilityError> {
    let mut remaining = branch_factor;
    let mut request = branch_factor;
    let mut failures = 0;
    let mut last_error = None;

    while remaining > 0 && failures < ctx.attempts() {
        match ctx.generate(input, request).await {
            Ok(states) if !states.is_empty() => {
                remaining -= states.len();
                request = request.min(remaining);
                produced.extend(states);
            }
            Ok(_) => {
                failures += 1;
                request = request.div_ceil(2);
                last_error = Some(CapabilityError::Failed("no candidates returned".to_string()));
            }
            Err(e @ CapabilityError::BudgetExhausted { .. }) => return Err(e),
            Err(e) => {
                failures += 1;
                request = request.div_ceil(2);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if remaining > 0 => Err(e),
        _ => Ok(()),
    }
}
