//! Scripted language model for testing.
//!
//! Replies are taken from a queue in call order, generation and aggregation
//! alike. Once the queue is empty, generation returns numbered drafts and
//! aggregation joins its inputs with a space.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::domain::errors::CapabilityError;
use crate::domain::models::{ThoughtState, TokenUsage};
use crate::domain::ports::{Completion, LanguageModel, PromptContext};

/// One scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    /// Return these texts (truncated to the requested count)
    Texts(Vec<String>),
    /// Fail the invocation with this message
    Failure(String),
    /// Never complete
    Stall,
}

/// Language model double that replays a script.
#[derive(Debug)]
pub struct ScriptedLanguageModel {
    script: Mutex<VecDeque<ScriptedResponse>>,
    cost_per_call: f64,
    prompt_tokens_per_call: u64,
    invocations: AtomicUsize,
    aggregate_calls: AtomicUsize,
    generate_requests: Mutex<Vec<usize>>,
}

impl ScriptedLanguageModel {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            cost_per_call: 0.0,
            prompt_tokens_per_call: 100,
            invocations: AtomicUsize::new(0),
            aggregate_calls: AtomicUsize::new(0),
            generate_requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_script(self, script: Vec<ScriptedResponse>) -> Self {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = script.into();
        self
    }

    #[must_use]
    pub fn with_cost_per_call(mut self, cost: f64) -> Self {
        self.cost_per_call = cost;
        self
    }

    /// Invocations received, failed ones included.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn aggregate_calls(&self) -> usize {
        self.aggregate_calls.load(Ordering::SeqCst)
    }

    /// Requested candidate counts of every generation call, in order.
    pub fn generate_requests(&self) -> Vec<usize> {
        self.generate_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_response(&self) -> Option<ScriptedResponse> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn completion(&self, texts: Vec<String>) -> Completion {
        let completion_tokens = texts
            .iter()
            .map(|t| t.split_whitespace().count() as u64)
            .sum();
        Completion {
            texts,
            usage: TokenUsage::new(self.prompt_tokens_per_call, completion_tokens, self.cost_per_call),
        }
    }

    async fn replay(&self, response: ScriptedResponse) -> Result<Vec<String>, CapabilityError> {
        match response {
            ScriptedResponse::Texts(texts) => Ok(texts),
            ScriptedResponse::Failure(message) => Err(CapabilityError::Failed(message)),
            ScriptedResponse::Stall => std::future::pending().await,
        }
    }
}

impl Default for ScriptedLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        _state: &ThoughtState,
        n: usize,
        _context: &PromptContext,
    ) -> Result<Completion, CapabilityError> {
        self.generate_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(n);

        let texts = match self.next_response() {
            Some(response) => self.replay(response).await?,
            None => {
                let call = self.invocations();
                (0..n).map(|i| format!("draft {call}.{i}")).collect()
            }
        };
        Ok(self.completion(texts.into_iter().take(n).collect()))
    }

    async fn aggregate(
        &self,
        states: &[ThoughtState],
        _context: &PromptContext,
    ) -> Result<Completion, CapabilityError> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);

        let texts = match self.next_response() {
            Some(response) => self.replay(response).await?,
            None => vec![states
                .iter()
                .map(|s| s.current.as_str())
                .collect::<Vec<_>>()
                .join(" ")],
        };
        Ok(self.completion(texts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Provenance;

    #[tokio::test]
    async fn test_script_then_default() {
        let lm = ScriptedLanguageModel::new()
            .with_cost_per_call(0.5)
            .with_script(vec![ScriptedResponse::Texts(vec!["a b".to_string(), "c".to_string()])]);
        let seed = ThoughtState::seed(Provenance::default());
        let ctx = PromptContext::default();

        let first = lm.generate(&seed, 1, &ctx).await.unwrap();
        assert_eq!(first.texts, vec!["a b"]);
        assert_eq!(first.usage.completion_tokens, 2);
        assert!((first.usage.cost - 0.5).abs() < f64::EPSILON);

        let second = lm.generate(&seed, 2, &ctx).await.unwrap();
        assert_eq!(second.texts.len(), 2);
        assert_eq!(lm.invocations(), 2);
        assert_eq!(lm.generate_requests(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failure_and_default_aggregate() {
        let lm = ScriptedLanguageModel::new()
            .with_script(vec![ScriptedResponse::Failure("boom".to_string())]);
        let seed = ThoughtState::seed(Provenance::default());
        let states = vec![seed.with_current("x"), seed.with_current("y")];
        let ctx = PromptContext::default();

        assert!(lm.aggregate(&states, &ctx).await.is_err());
        let merged = lm.aggregate(&states, &ctx).await.unwrap();
        assert_eq!(merged.texts, vec!["x y"]);
        assert_eq!(lm.aggregate_calls(), 2);
    }
}
