use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid budget: {0}. Must be positive and finite")]
    InvalidBudget(f64),

    #[error("Invalid max_concurrency: {0}. Must be between 1 and 64")]
    InvalidMaxConcurrency(usize),

    #[error("Invalid generation_attempts: {0}. Cannot be 0")]
    InvalidGenerationAttempts(u32),

    #[error("Invalid invocation_timeout_secs: {0}. Cannot be 0")]
    InvalidTimeout(u64),

    #[error("Invalid pricing: {0}. Token costs must be non-negative and finite")]
    InvalidPricing(f64),

    #[error("Invalid percentile: {0}. Must be in (0, 1)")]
    InvalidPercentile(f64),

    #[error("Invalid prompt token limit: {0}. Must be at least 1")]
    InvalidVariant(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .thoughtgraph/config.yaml (project config)
    /// 3. .thoughtgraph/local.yaml (local overrides, optional)
    /// 4. Environment variables (THOUGHTGRAPH_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".thoughtgraph/config.yaml"))
            .merge(Yaml::file(".thoughtgraph/local.yaml"))
            .merge(Env::prefixed("THOUGHTGRAPH_").split("__"))
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("THOUGHTGRAPH_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if !config.budget.is_finite() || config.budget <= 0.0 {
            return Err(ConfigError::InvalidBudget(config.budget));
        }

        if config.max_concurrency == 0 || config.max_concurrency > 64 {
            return Err(ConfigError::InvalidMaxConcurrency(config.max_concurrency));
        }

        if config.executor.generation_attempts == 0 {
            return Err(ConfigError::InvalidGenerationAttempts(
                config.executor.generation_attempts,
            ));
        }

        if config.executor.invocation_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidTimeout(0));
        }

        let pricing = &config.language_model.pricing;
        for cost in [pricing.prompt_token_cost, pricing.response_token_cost] {
            if !cost.is_finite() || cost < 0.0 {
                return Err(ConfigError::InvalidPricing(cost));
            }
        }

        if config.language_model.name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "language_model.name cannot be empty".to_string(),
            ));
        }

        if config.variants.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "at least one prompt token limit variant is required".to_string(),
            ));
        }
        if let Some(&bad) = config.variants.iter().find(|&&v| v == 0) {
            return Err(ConfigError::InvalidVariant(bad));
        }

        if !is_percentile(config.calibration_percentile) {
            return Err(ConfigError::InvalidPercentile(config.calibration_percentile));
        }
        for entry in config.thresholds.entries() {
            if !is_percentile(entry.percentile) {
                return Err(ConfigError::InvalidPercentile(entry.percentile));
            }
            if !entry.threshold.is_finite() {
                return Err(ConfigError::ValidationFailed(format!(
                    "threshold for {} at {} is not finite",
                    entry.stage, entry.percentile
                )));
            }
        }

        // Validate logging config
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}

fn is_percentile(p: f64) -> bool {
    p > 0.0 && p < 1.0
}
