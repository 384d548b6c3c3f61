//! Token usage and pricing for language-model invocations.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Pricing per thousand tokens for a language model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    /// Cost per 1000 prompt tokens.
    pub prompt_token_cost: f64,
    /// Cost per 1000 completion tokens.
    pub response_token_cost: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            prompt_token_cost: 0.0015,
            response_token_cost: 0.002,
        }
    }
}

impl Pricing {
    /// Cost of one invocation with the given token counts.
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 / 1000.0).mul_add(
            self.prompt_token_cost,
            completion_tokens as f64 / 1000.0 * self.response_token_cost,
        )
    }
}

/// Tokens and cost consumed by one or more invocations.
///
/// Serializes as the trailing summary record of a run artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: f64,
}

impl TokenUsage {
    pub const fn new(prompt_tokens: u64, completion_tokens: u64, cost: f64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            cost,
        }
    }

    /// Usage priced with `pricing`.
    pub fn priced(prompt_tokens: u64, completion_tokens: u64, pricing: &Pricing) -> Self {
        Self::new(
            prompt_tokens,
            completion_tokens,
            pricing.cost(prompt_tokens, completion_tokens),
        )
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.cost += rhs.cost;
    }
}
