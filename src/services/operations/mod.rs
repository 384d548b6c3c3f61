//! Operation behaviour.
//!
//! Every graph node runs one of these transforms over the concatenated
//! outputs of its predecessors. Language-model calls go through
//! [`OperationContext`], which enforces the budget check before each
//! invocation, applies the optional timeout, charges the cost afterwards and
//! keeps the per-execution usage and counters.

mod adaptive;
mod aggregate;
mod generate;
mod keep_best;
mod score;

use std::future::Future;

use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::domain::errors::{CapabilityError, DomainResult};
use crate::domain::models::{Budget, ExecutorSettings, Operation, RunMetrics, ThoughtState, TokenUsage};
use crate::domain::ports::{Completion, LanguageModel, PromptContext, Scorer};

pub use keep_best::keep_best_n;

/// States produced by one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationOutput {
    pub states: Vec<ThoughtState>,
    /// The budget ran out while this node was running; its states are partial.
    pub budget_exhausted: bool,
}

impl OperationOutput {
    pub const fn complete(states: Vec<ThoughtState>) -> Self {
        Self {
            states,
            budget_exhausted: false,
        }
    }

    pub const fn exhausted(states: Vec<ThoughtState>) -> Self {
        Self {
            states,
            budget_exhausted: true,
        }
    }
}

/// Capabilities and bookkeeping for one graph execution.
pub struct OperationContext<'a> {
    language_model: &'a dyn LanguageModel,
    budget: &'a Budget,
    settings: &'a ExecutorSettings,
    prompt: PromptContext,
    usage: TokenUsage,
    metrics: RunMetrics,
}

impl<'a> OperationContext<'a> {
    pub fn new(
        language_model: &'a dyn LanguageModel,
        budget: &'a Budget,
        settings: &'a ExecutorSettings,
        prompt: PromptContext,
    ) -> Self {
        Self {
            language_model,
            budget,
            settings,
            prompt,
            usage: TokenUsage::default(),
            metrics: RunMetrics::default(),
        }
    }

    pub const fn usage(&self) -> &TokenUsage {
        &self.usage
    }

    pub const fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut RunMetrics {
        &mut self.metrics
    }

    pub fn budget_depleted(&self) -> bool {
        self.budget.is_depleted()
    }

    pub const fn attempts(&self) -> u32 {
        self.settings.generation_attempts
    }

    /// Ask for up to `n` continuations of `state`.
    pub async fn generate(
        &mut self,
        state: &ThoughtState,
        n: usize,
    ) -> Result<Vec<ThoughtState>, CapabilityError> {
        let language_model = self.language_model;
        let prompt = self.prompt;
        let completion = self
            .invoke(language_model.generate(state, n, &prompt))
            .await?;
        Ok(completion
            .texts
            .into_iter()
            .take(n)
            .map(|text| state.with_current(text))
            .collect())
    }

    /// Merge `states` into one draft, derived from the first state.
    pub async fn aggregate(
        &mut self,
        states: &[ThoughtState],
    ) -> Result<ThoughtState, CapabilityError> {
        let Some(first) = states.first() else {
            return Err(CapabilityError::Failed("nothing to aggregate".to_string()));
        };
        let language_model = self.language_model;
        let prompt = self.prompt;
        let completion = self
            .invoke(language_model.aggregate(states, &prompt))
            .await?;
        completion
            .texts
            .into_iter()
            .next()
            .map(|text| first.with_current(text))
            .ok_or_else(|| CapabilityError::Failed("aggregation returned no text".to_string()))
    }

    /// Score `state`, defaulting to 0.0 when the scorer fails.
    pub fn score(&mut self, scorer: &dyn Scorer, state: &ThoughtState) -> ThoughtState {
        let score = match scorer.score(state) {
            Ok(value) if value.is_finite() => value,
            Ok(value) => {
                self.scoring_failed(scorer, &format!("non-finite score {value}"), 1);
                0.0
            }
            Err(e) => {
                self.scoring_failed(scorer, &e.to_string(), 1);
                0.0
            }
        };
        state
            .with_score(score)
            .with_score_details(scorer.details(state))
    }

    pub(crate) fn scoring_failed(&mut self, scorer: &dyn Scorer, error: &str, states: usize) {
        warn!(scorer = scorer.name(), states, error, "scoring failed, defaulting to 0.0");
        self.metrics.scoring_failures += states as u64;
    }

    async fn invoke<F>(&mut self, call: F) -> Result<Completion, CapabilityError>
    where
        F: Future<Output = Result<Completion, CapabilityError>>,
    {
        let reservation = self.budget.reserve()?;
        self.metrics.invocations += 1;

        let result = match self.settings.invocation_timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), call)
                .await
                .unwrap_or(Err(CapabilityError::Timeout(secs))),
            None => call.await,
        };

        match result {
            Ok(completion) => {
                let remaining = reservation.settle(completion.usage.cost);
                self.usage += completion.usage;
                debug!(
                    model = self.language_model.name(),
                    cost = completion.usage.cost,
                    remaining,
                    "invocation completed"
                );
                Ok(completion)
            }
            Err(e) => {
                self.metrics.failed_invocations += 1;
                warn!(model = self.language_model.name(), error = %e, "invocation failed");
                Err(e)
            }
        }
    }
}

/// Run `operation` over `inputs`.
pub async fn execute(
    operation: &Operation,
    inputs: Vec<ThoughtState>,
    ctx: &mut OperationContext<'_>,
) -> DomainResult<OperationOutput> {
    match operation {
        Operation::Generate { branch_factor, .. } => {
            Ok(generate::generate(ctx, &inputs, *branch_factor).await)
        }
        Operation::Score {
            batch_size,
            combined,
            scorer,
        } => score::score(ctx, &inputs, *batch_size, *combined, scorer.as_ref())
            .map(OperationOutput::complete),
        Operation::KeepBestN { n, highest_is_best } => Ok(OperationOutput::complete(
            keep_best_n(inputs, *n, *highest_is_best),
        )),
        Operation::Aggregate { num_to_combine } => {
            Ok(aggregate::aggregate(ctx, inputs, *num_to_combine).await)
        }
        Operation::DGenerateScore {
            branch_factor,
            scorer,
            threshold,
            ..
        } => Ok(adaptive::d_generate_score(ctx, &inputs, *branch_factor, scorer.as_ref(), *threshold).await),
        Operation::DAggregate {
            num_to_combine,
            scorer,
            threshold_high,
            threshold_low,
        } => Ok(adaptive::d_aggregate(
            ctx,
            inputs,
            *num_to_combine,
            scorer.as_ref(),
            *threshold_high,
            *threshold_low,
        )
        .await),
    }
}
