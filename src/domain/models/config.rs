use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::thresholds::ThresholdTable;
use super::usage::Pricing;

/// Main configuration structure for thoughtgraph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Total spending allowance for one run, in the pricing currency
    #[serde(default = "default_budget")]
    pub budget: f64,

    /// Maximum graph executions in flight at once (1 = sequential)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Graph executor settings
    #[serde(default)]
    pub executor: ExecutorSettings,

    /// Language model identity and pricing
    #[serde(default)]
    pub language_model: LanguageModelConfig,

    /// Corpus location
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Results location
    #[serde(default)]
    pub output: OutputConfig,

    /// Prompt token limits to run every method under
    #[serde(default = "default_variants")]
    pub variants: Vec<usize>,

    /// Percentile whose gate thresholds adaptive methods use
    #[serde(default = "default_calibration_percentile")]
    pub calibration_percentile: f64,

    /// Calibrated gate thresholds
    #[serde(default)]
    pub thresholds: ThresholdTable,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_budget() -> f64 {
    30.0
}

const fn default_max_concurrency() -> usize {
    1
}

fn default_variants() -> Vec<usize> {
    vec![4096]
}

const fn default_calibration_percentile() -> f64 {
    0.5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            max_concurrency: default_max_concurrency(),
            executor: ExecutorSettings::default(),
            language_model: LanguageModelConfig::default(),
            dataset: DatasetConfig::default(),
            output: OutputConfig::default(),
            variants: default_variants(),
            calibration_percentile: default_calibration_percentile(),
            thresholds: ThresholdTable::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Graph executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorSettings {
    /// Failed invocations tolerated per generation or aggregation request
    #[serde(default = "default_generation_attempts")]
    pub generation_attempts: u32,

    /// Per-invocation timeout; unset waits indefinitely
    #[serde(default)]
    pub invocation_timeout_secs: Option<u64>,
}

const fn default_generation_attempts() -> u32 {
    3
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            generation_attempts: default_generation_attempts(),
            invocation_timeout_secs: None,
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LanguageModelConfig {
    /// Model name used in result directory names
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Price per thousand tokens
    #[serde(default)]
    pub pricing: Pricing,
}

fn default_model_name() -> String {
    "offline".to_string()
}

impl Default for LanguageModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            pricing: Pricing::default(),
        }
    }
}

/// Corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatasetConfig {
    /// Index file listing sample ids and their references
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Directory of `<id>.json` source articles
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Directory of `<id>.json` reference maps
    #[serde(default = "default_reference_dir")]
    pub reference_dir: PathBuf,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/test_graph.json")
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("data/test/pmc")
}

fn default_reference_dir() -> PathBuf {
    PathBuf::from("data/test/pm")
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            source_dir: default_source_dir(),
            reference_dir: default_reference_dir(),
        }
    }
}

/// Results configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    /// Parent directory of per-run result folders
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation of log files: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "never".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
