//! Corpus sample model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::thought::{Provenance, ThoughtState};

/// Source article as stored in the corpus (`<source_dir>/<id>.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArticle {
    #[serde(rename = "article_title_text", default)]
    pub title: String,
    #[serde(rename = "abstract_text", default)]
    pub abstract_text: String,
    #[serde(rename = "introduction_text", default)]
    pub introduction: String,
    /// Body sections keyed by section title
    #[serde(rename = "sec_dict", default)]
    pub sections: BTreeMap<String, String>,
}

/// One corpus item: an article and the works it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Corpus identifier (e.g. a PMC id)
    pub id: String,
    /// Position in the corpus index, used to name result files
    pub index: usize,
    pub article: SourceArticle,
    /// Referenced works: title -> abstract
    pub references: BTreeMap<String, String>,
}

impl Sample {
    /// Seed thought state for running `method` on this sample.
    pub fn seed_state(&self, method: &str) -> ThoughtState {
        ThoughtState::seed(Provenance {
            origin_title: self.article.title.clone(),
            origin_abstract: self.article.abstract_text.clone(),
            origin_introduction: self.article.introduction.clone(),
            origin_info: self.article.sections.clone(),
            reference_info: self.references.clone(),
            method: method.to_string(),
        })
    }
}
