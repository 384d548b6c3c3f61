//! Port trait definitions (Hexagonal Architecture)
//!
//! The executor consumes two external capabilities through these traits:
//! - `LanguageModel`: candidate generation and aggregation (one LM call each)
//! - `Scorer`: numeric quality score of a thought state
//!
//! Prompt assembly, truncation and wire transport live behind
//! `LanguageModel` implementations; the scoring formula lives behind `Scorer`.

pub mod language_model;
pub mod scorer;

pub use language_model::{Completion, LanguageModel, PromptContext};
pub use scorer::{FnScorer, Scorer, ScoreDetails};
