//! Results directory.
//!
//! One directory per experiment run:
//!
//! ```text
//! <results_dir>/<lm>_<methods>_<timestamp>/
//!     config.json
//!     <method>_<variant>/<sample index>.json
//!     metrics.json
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RunArtifact, RunMetrics};

const CONFIG_FILE: &str = "config.json";
const METRICS_FILE: &str = "metrics.json";

/// What was run, written as `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Sample ids, in run order
    pub data: Vec<String>,
    pub methods: Vec<String>,
    pub lm: String,
    pub budget: f64,
    /// Prompt token limits every method ran under
    pub variants: Vec<usize>,
}

/// Writes the artifacts of one experiment run.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    /// Create a fresh, timestamped run directory under `results_dir`.
    pub async fn create(results_dir: &Path, lm: &str, methods: &[String]) -> DomainResult<Self> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let root = results_dir.join(format!("{lm}_{}_{timestamp}", methods.join("-")));
        fs::create_dir_all(&root)
            .await
            .map_err(|e| DomainError::io(&root, &e))?;
        debug!(root = %root.display(), "created run directory");
        Ok(Self { root })
    }

    /// Use an existing run directory.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Label of one (method, variant) pair, also its directory name.
    pub fn job_label(method: &str, variant: usize) -> String {
        format!("{method}_{variant}")
    }

    pub fn artifact_path(&self, label: &str, index: usize) -> PathBuf {
        self.root.join(label).join(format!("{index}.json"))
    }

    pub async fn write_record(&self, record: &RunRecord) -> DomainResult<()> {
        write_json(&self.root.join(CONFIG_FILE), record).await
    }

    pub async fn write_artifact(
        &self,
        label: &str,
        index: usize,
        artifact: &RunArtifact,
    ) -> DomainResult<PathBuf> {
        let path = self.artifact_path(label, index);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::io(parent, &e))?;
        }
        write_json(&path, artifact).await?;
        Ok(path)
    }

    pub async fn write_metrics(&self, metrics: &BTreeMap<String, RunMetrics>) -> DomainResult<()> {
        write_json(&self.root.join(METRICS_FILE), metrics).await
    }

    /// Every run artifact below the run directory, in path order.
    ///
    /// Files that do not parse as artifacts are skipped with a warning.
    pub fn load_artifacts(&self) -> DomainResult<Vec<RunArtifact>> {
        let mut paths = Vec::new();
        collect_json_files(&self.root, &mut paths)?;
        paths.sort();

        let mut artifacts = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name == CONFIG_FILE || name == METRICS_FILE {
                continue;
            }
            let raw = std::fs::read_to_string(&path).map_err(|e| DomainError::io(&path, &e))?;
            match serde_json::from_str::<RunArtifact>(&raw) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable artifact"),
            }
        }
        Ok(artifacts)
    }
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> DomainResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| DomainError::io(dir, &e))?;
    for entry in entries {
        let path = entry.map_err(|e| DomainError::io(dir, &e))?.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> DomainResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .await
        .map_err(|e| DomainError::io(path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{OperationKind, OperationRecord, Provenance, ThoughtState, TokenUsage};

    fn artifact(score: f64) -> RunArtifact {
        let state = ThoughtState::seed(Provenance::default())
            .with_current("draft")
            .with_score(score);
        RunArtifact {
            records: vec![OperationRecord::new(OperationKind::Score, vec![state])],
            summary: TokenUsage::new(10, 2, 0.001),
        }
    }

    #[tokio::test]
    async fn test_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::create(dir.path(), "offline", &["tot".to_string(), "got".to_string()])
            .await
            .unwrap();

        let name = store.root().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("offline_tot-got_"));

        store
            .write_record(&RunRecord {
                data: vec!["PMC1".to_string()],
                methods: vec!["tot".to_string()],
                lm: "offline".to_string(),
                budget: 1.0,
                variants: vec![4096],
            })
            .await
            .unwrap();
        let label = RunStore::job_label("tot", 4096);
        let path = store.write_artifact(&label, 7, &artifact(0.3)).await.unwrap();
        assert!(path.ends_with("tot_4096/7.json"));

        store
            .write_metrics(&BTreeMap::from([(label, RunMetrics::default())]))
            .await
            .unwrap();
        assert!(store.root().join("config.json").exists());
        assert!(store.root().join("metrics.json").exists());
    }

    #[tokio::test]
    async fn test_load_artifacts_skips_bookkeeping_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path());
        store.write_artifact("got_512", 0, &artifact(0.1)).await.unwrap();
        store.write_artifact("got_512", 1, &artifact(0.2)).await.unwrap();
        store.write_metrics(&BTreeMap::new()).await.unwrap();
        std::fs::write(dir.path().join("got_512/broken.json"), "{").unwrap();

        let artifacts = store.load_artifacts().unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0], artifact(0.1));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let store = RunStore::open("/nonexistent/results");
        assert!(matches!(store.load_artifacts(), Err(DomainError::Io { .. })));
    }
}
