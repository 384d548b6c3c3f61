//! Corpus loader.
//!
//! The corpus is an index file listing sample ids, a directory of source
//! articles and a directory of reference maps, both keyed `<id>.json`.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{DatasetConfig, Sample, SourceArticle};

#[derive(Debug, Deserialize)]
struct CorpusIndex {
    #[serde(rename = "PMCid")]
    ids: Vec<Value>,
}

/// Reads samples from the configured corpus.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    config: DatasetConfig,
}

impl DatasetLoader {
    pub const fn new(config: DatasetConfig) -> Self {
        Self { config }
    }

    /// All sample ids, in index order.
    pub async fn load_index(&self) -> DomainResult<Vec<String>> {
        let index: CorpusIndex = read_json(&self.config.index_path).await?;
        Ok(index
            .ids
            .into_iter()
            .map(|id| match id {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect())
    }

    /// Load the samples at index positions `range` (clamped to the index).
    ///
    /// A sample whose source article cannot be read is skipped with a
    /// warning; a missing reference map is treated as "no references".
    pub async fn load_samples(&self, range: Range<usize>) -> DomainResult<Vec<Sample>> {
        let ids = self.load_index().await?;
        let end = range.end.min(ids.len());
        let start = range.start.min(end);

        let mut samples = Vec::with_capacity(end - start);
        for (index, id) in ids.into_iter().enumerate().take(end).skip(start) {
            match self.load_sample(index, id).await {
                Ok(sample) => samples.push(sample),
                Err(e) => warn!(index, error = %e, "skipping sample"),
            }
        }

        info!(requested = end - start, loaded = samples.len(), "corpus samples loaded");
        Ok(samples)
    }

    async fn load_sample(&self, index: usize, id: String) -> DomainResult<Sample> {
        let file_name = format!("{id}.json");
        let source_path = self.config.source_dir.join(&file_name);
        if !source_path.exists() {
            return Err(DomainError::SampleNotFound(id));
        }
        let article: SourceArticle = read_json(&source_path).await?;

        let reference_path = self.config.reference_dir.join(&file_name);
        let references: BTreeMap<String, String> = if reference_path.exists() {
            read_json(&reference_path).await?
        } else {
            warn!(id = %id, "no reference file, continuing without references");
            BTreeMap::new()
        };

        Ok(Sample {
            id,
            index,
            article,
            references,
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> DomainResult<T> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|e| DomainError::io(path, &e))?;
    serde_json::from_str(&raw).map_err(|e| {
        DomainError::SerializationError(format!("{}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(path: PathBuf, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn corpus(dir: &Path) -> DatasetConfig {
        write(
            dir.join("index.json"),
            r#"{"PMCid": ["PMC1", "PMC2", "PMC3"], "references": [[], [], []]}"#,
        );
        for id in ["PMC1", "PMC3"] {
            write(
                dir.join("pmc").join(format!("{id}.json")),
                &format!(
                    r#"{{"article_title_text": "{id}", "abstract_text": "a", "introduction_text": "i", "sec_dict": {{}}}}"#
                ),
            );
        }
        write(dir.join("pm/PMC1.json"), r#"{"Ref": "Ref abstract"}"#);
        DatasetConfig {
            index_path: dir.join("index.json"),
            source_dir: dir.join("pmc"),
            reference_dir: dir.join("pm"),
        }
    }

    #[tokio::test]
    async fn test_load_samples_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(corpus(dir.path()));

        let samples = loader.load_samples(0..10).await.unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].id, "PMC1");
        assert_eq!(samples[0].references.len(), 1);
        assert_eq!(samples[1].index, 2);
        assert!(samples[1].references.is_empty());
    }

    #[tokio::test]
    async fn test_range_selects_positions() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(corpus(dir.path()));

        let samples = loader.load_samples(2..3).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].article.title, "PMC3");
        assert!(loader.load_samples(5..9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_index_is_error() {
        let loader = DatasetLoader::new(DatasetConfig {
            index_path: PathBuf::from("/nonexistent/index.json"),
            ..DatasetConfig::default()
        });
        assert!(matches!(
            loader.load_samples(0..1).await,
            Err(DomainError::Io { .. })
        ));
    }
}
