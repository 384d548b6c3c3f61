//! Offline extractive language model.
//!
//! Builds drafts from sentences of the source material without calling any
//! service, so whole experiments can run end to end (dry runs, demos, CI).
//! Token counts are whitespace words and are priced like a hosted model so
//! budget accounting behaves as it would against one.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::errors::CapabilityError;
use crate::domain::models::{Pricing, ThoughtState, TokenUsage};
use crate::domain::ports::{Completion, LanguageModel, PromptContext};

const SENTENCES_PER_DRAFT: usize = 3;
const MAX_MERGED_SENTENCES: usize = 6;

/// Deterministic sentence-picking language model.
#[derive(Debug)]
pub struct OfflineLanguageModel {
    name: String,
    pricing: Pricing,
    calls: AtomicUsize,
}

impl OfflineLanguageModel {
    pub fn new(name: impl Into<String>, pricing: Pricing) -> Self {
        Self {
            name: name.into(),
            pricing,
            calls: AtomicUsize::new(0),
        }
    }

    fn prompt_tokens(&self, state: &ThoughtState, context: &PromptContext) -> u64 {
        let provenance = state.provenance();
        let words = [
            provenance.origin_title.as_str(),
            provenance.origin_introduction.as_str(),
            state.current.as_str(),
        ]
        .into_iter()
        .chain(provenance.origin_info.values().map(String::as_str))
        .chain(provenance.reference_info.values().map(String::as_str))
        .map(word_count)
        .sum::<usize>();
        let limited = context.prompt_token_limit.map_or(words, |limit| words.min(limit));
        limited as u64
    }

    fn usage(&self, prompt_tokens: u64, texts: &[String]) -> TokenUsage {
        let completion_tokens = texts.iter().map(|t| word_count(t) as u64).sum();
        TokenUsage::priced(prompt_tokens, completion_tokens, &self.pricing)
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn source_sentences(state: &ThoughtState) -> Vec<String> {
    let provenance = state.provenance();
    let mut pool = sentences(&provenance.origin_introduction);
    for section in provenance.origin_info.values() {
        pool.extend(sentences(section));
    }
    for reference in provenance.reference_info.values() {
        pool.extend(sentences(reference));
    }
    if pool.is_empty() {
        pool.push(provenance.origin_title.clone());
    }
    pool
}

#[async_trait]
impl LanguageModel for OfflineLanguageModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        state: &ThoughtState,
        n: usize,
        context: &PromptContext,
    ) -> Result<Completion, CapabilityError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let pool = source_sentences(state);

        let texts: Vec<String> = (0..n)
            .map(|i| {
                let start = (call * n + i) * SENTENCES_PER_DRAFT % pool.len();
                let picked = pool
                    .iter()
                    .cycle()
                    .skip(start)
                    .take(SENTENCES_PER_DRAFT.min(pool.len()))
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                if state.current.is_empty() {
                    picked
                } else {
                    format!("{} {picked}", state.current)
                }
            })
            .collect();

        let usage = self.usage(self.prompt_tokens(state, context), &texts);
        Ok(Completion { texts, usage })
    }

    async fn aggregate(
        &self,
        states: &[ThoughtState],
        context: &PromptContext,
    ) -> Result<Completion, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut merged: Vec<String> = Vec::new();
        for state in states {
            for sentence in sentences(&state.current) {
                if merged.len() < MAX_MERGED_SENTENCES && !merged.contains(&sentence) {
                    merged.push(sentence);
                }
            }
        }
        let texts = vec![merged.join(" ")];

        let prompt_tokens = states.iter().map(|s| self.prompt_tokens(s, context)).sum();
        let usage = self.usage(prompt_tokens, &texts);
        Ok(Completion { texts, usage })
    }
}
