//! Language model port - generation and aggregation capability.

use async_trait::async_trait;

use crate::domain::errors::CapabilityError;
use crate::domain::models::{ThoughtState, TokenUsage};

/// Run-variant settings forwarded to the prompt builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptContext {
    /// Upper bound on prompt tokens; the implementation truncates source
    /// material to fit.
    pub prompt_token_limit: Option<usize>,
}

/// Responses and cost of one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Parsed candidate drafts, at most the requested count.
    pub texts: Vec<String>,
    /// Tokens and monetary cost of this invocation.
    pub usage: TokenUsage,
}

/// Trait for language-model backends.
///
/// Each method call is exactly one external invocation whose cost is
/// reported in the returned [`Completion`]. Retries, budget checks and
/// timeouts are the caller's concern.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model name, used for result directory naming.
    fn name(&self) -> &str;

    /// Draw up to `n` independent candidate drafts refining `state`.
    async fn generate(
        &self,
        state: &ThoughtState,
        n: usize,
        context: &PromptContext,
    ) -> Result<Completion, CapabilityError>;

    /// Merge `states` into one draft.
    async fn aggregate(
        &self,
        states: &[ThoughtState],
        context: &PromptContext,
    ) -> Result<Completion, CapabilityError>;
}
