//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

use std::path::Path;
use std::sync::Arc;

use thoughtgraph::adapters::scripted_language_model::{ScriptedLanguageModel, ScriptedResponse};
use thoughtgraph::domain::models::{DatasetConfig, Provenance};
use thoughtgraph::domain::ports::FnScorer;
use thoughtgraph::{Budget, ExecutorSettings, GraphExecutor, Scorer, ThoughtState};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Seed state with a small but complete provenance.
#[allow(dead_code)]
pub fn seed() -> ThoughtState {
    ThoughtState::seed(Provenance {
        origin_title: "Graph search for summaries".to_string(),
        origin_abstract: "graph search improves summaries under a fixed budget".to_string(),
        origin_introduction: "summaries are refined by searching a graph of drafts".to_string(),
        method: "test".to_string(),
        ..Provenance::default()
    })
}

/// Scores a draft by parsing its text as a number.
#[allow(dead_code)]
pub fn parse_scorer() -> Arc<dyn Scorer> {
    Arc::new(FnScorer::new("parse", |s: &ThoughtState| {
        Ok(s.current.trim().parse::<f64>()?)
    }))
}

/// Scripted responses of one text each.
#[allow(dead_code)]
pub fn single_texts(items: &[&str]) -> Vec<ScriptedResponse> {
    items
        .iter()
        .map(|t| ScriptedResponse::Texts(vec![(*t).to_string()]))
        .collect()
}

/// Executor over a scripted model, returning the model for inspection.
#[allow(dead_code)]
pub fn scripted_executor(
    lm: ScriptedLanguageModel,
    budget: f64,
) -> (GraphExecutor, Arc<ScriptedLanguageModel>) {
    let lm = Arc::new(lm);
    let executor = GraphExecutor::new(lm.clone(), Budget::new(budget), ExecutorSettings::default());
    (executor, lm)
}

/// Write a three-article corpus under `dir`.
#[allow(dead_code)]
pub fn write_corpus(dir: &Path) -> DatasetConfig {
    let source_dir = dir.join("pmc");
    let reference_dir = dir.join("pm");
    std::fs::create_dir_all(&source_dir).expect("Failed to create source dir");
    std::fs::create_dir_all(&reference_dir).expect("Failed to create reference dir");

    let ids = ["PMC100", "PMC200", "PMC300"];
    for (n, id) in ids.iter().enumerate() {
        let article = serde_json::json!({
            "article_title_text": format!("Study {n} of sparse graph search"),
            "abstract_text": format!(
                "We study graph search number {n}. Adaptive gates cut sampling cost. Quality stays high."
            ),
            "introduction_text": format!(
                "Graph search number {n} refines drafts. Each draft is scored. The best drafts are merged."
            ),
            "sec_dict": {
                "Methods": "Drafts are generated in rounds. Scores gate further sampling.",
                "Results": "Adaptive gates reduce cost. Scores remain comparable."
            }
        });
        std::fs::write(source_dir.join(format!("{id}.json")), article.to_string())
            .expect("Failed to write article");
        std::fs::write(
            reference_dir.join(format!("{id}.json")),
            r#"{"Prior work": "Sampling many drafts is costly. Early stopping helps."}"#,
        )
        .expect("Failed to write references");
    }

    let index = serde_json::json!({ "PMCid": ids, "references": [[], [], []] });
    let index_path = dir.join("index.json");
    std::fs::write(&index_path, index.to_string()).expect("Failed to write index");

    DatasetConfig {
        index_path,
        source_dir,
        reference_dir,
    }
}
