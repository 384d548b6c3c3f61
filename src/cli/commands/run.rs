//! Run CLI command.

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::ProgressBar;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::adapters::offline_language_model::OfflineLanguageModel;
use crate::adapters::overlap_scorer::{OverlapScorer, ReferenceText};
use crate::cli::output::progress::{create_progress_bar, create_spinner, track_run};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Budget, Config, RunMetrics, StageThresholds};
use crate::infrastructure::dataset::DatasetLoader;
use crate::infrastructure::persistence::RunStore;
use crate::services::experiment_runner::{ExperimentPlan, ExperimentRunner};
use crate::services::graph_templates::{Method, ScorerSet};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// First corpus index to run (inclusive)
    #[arg(short, long, default_value_t = 0)]
    pub begin: usize,

    /// Last corpus index to run (exclusive); defaults to the end of the corpus
    #[arg(short, long)]
    pub end: Option<usize>,

    /// Methods to run, in order
    #[arg(short, long = "method", required = true, value_delimiter = ',')]
    pub methods: Vec<Method>,

    /// Spending allowance for the whole run (overrides the config)
    #[arg(long)]
    pub budget: Option<f64>,

    /// Prompt token limits to run every method under (overrides the config)
    #[arg(long = "variant", value_delimiter = ',')]
    pub variants: Vec<usize>,

    /// Maximum jobs in flight (overrides the config)
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Print the job plan without invoking the language model
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct PlanOutput {
    pub samples: Vec<String>,
    pub methods: Vec<Method>,
    pub variants: Vec<usize>,
    pub jobs: usize,
    pub budget: f64,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let methods: Vec<&str> = self.methods.iter().map(|m| m.as_str()).collect();
        let mut lines = vec![
            "Dry run, nothing executed.".to_string(),
            format!("Samples:  {}", self.samples.len()),
            format!("Methods:  {}", methods.join(", ")),
            format!("Variants: {:?}", self.variants),
            format!("Jobs:     {}", self.jobs),
            format!("Budget:   {:.4}", self.budget),
        ];
        if let (Some(first), Some(last)) = (self.samples.first(), self.samples.last()) {
            lines.push(format!("Range:    {first} .. {last}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub run_dir: PathBuf,
    pub budget: f64,
    pub spent: f64,
    pub completed: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
    pub metrics: BTreeMap<String, RunMetrics>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Results: {}", self.run_dir.display()),
            format!(
                "Jobs: {} completed, {} partial, {} failed, {} skipped",
                self.completed, self.partial, self.failed, self.skipped
            ),
            format!("Spent {:.4} of {:.4} budget", self.spent, self.budget),
        ];
        if !self.metrics.is_empty() {
            lines.push(String::new());
            lines.push(TableFormatter::new().format_metrics(&self.metrics));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, mut config: Config, json_mode: bool) -> Result<()> {
    if let Some(budget) = args.budget {
        if !(budget.is_finite() && budget > 0.0) {
            bail!("Budget must be positive, got {budget}");
        }
        config.budget = budget;
    }
    if !args.variants.is_empty() {
        config.variants = args.variants.clone();
    }
    if let Some(max_concurrency) = args.max_concurrency {
        config.max_concurrency = max_concurrency;
    }

    let spinner = if json_mode {
        ProgressBar::hidden()
    } else {
        create_spinner("loading corpus")
    };
    let loader = DatasetLoader::new(config.dataset.clone());
    let samples = loader
        .load_samples(args.begin..args.end.unwrap_or(usize::MAX))
        .await
        .context("Failed to load corpus samples")?;
    spinner.finish_and_clear();

    let plan = ExperimentPlan {
        samples,
        methods: args.methods.clone(),
        variants: config.variants.clone(),
    };

    if args.dry_run {
        let result = PlanOutput {
            samples: plan.samples.iter().map(|s| s.id.clone()).collect(),
            methods: plan.methods.clone(),
            variants: plan.variants.clone(),
            jobs: plan.jobs().len(),
            budget: config.budget,
        };
        output(&result, json_mode);
        return Ok(());
    }

    let gates = gates_for(&plan.methods, &config)?;
    let language_model = Arc::new(OfflineLanguageModel::new(
        config.language_model.name.clone(),
        config.language_model.pricing,
    ));
    let scorers = ScorerSet {
        intermediate: Arc::new(OverlapScorer::new(ReferenceText::Introduction)),
        evaluation: Arc::new(OverlapScorer::new(ReferenceText::Abstract)),
    };

    let method_names: Vec<String> = plan.methods.iter().map(ToString::to_string).collect();
    let store = RunStore::create(&config.output.results_dir, &config.language_model.name, &method_names)
        .await
        .context("Failed to create results directory")?;

    let runner = ExperimentRunner::new(
        language_model,
        Budget::new(config.budget),
        config.executor.clone(),
        scorers,
        gates,
    )
    .with_max_concurrency(config.max_concurrency);

    let pb = if json_mode {
        ProgressBar::hidden()
    } else {
        create_progress_bar(plan.jobs().len() as u64)
    };
    let (tx, rx) = mpsc::channel(100);
    let progress = track_run(pb, rx);

    let summary = runner
        .run_with_events(&plan, &store, tx)
        .await
        .context("Experiment run failed")?;
    progress.await.ok();

    let result = RunOutput {
        run_dir: store.root().to_path_buf(),
        budget: config.budget,
        spent: summary.spent,
        completed: summary.completed,
        partial: summary.partial,
        failed: summary.failed,
        skipped: summary.skipped,
        metrics: summary.metrics,
    };
    output(&result, json_mode);

    Ok(())
}

/// Gate thresholds for the configured calibration percentile.
///
/// Only adaptive methods read gates, so a table without that percentile is
/// an error only when one of them is requested.
fn gates_for(methods: &[Method], config: &Config) -> Result<StageThresholds> {
    match StageThresholds::from_table(&config.thresholds, config.calibration_percentile) {
        Ok(gates) => Ok(gates),
        Err(e) if methods.iter().any(|m| m.is_adaptive()) => {
            Err(e).context("No gate thresholds for adaptive methods; run `thoughtgraph calibrate`")
        }
        Err(_) => Ok(StageThresholds {
            generate: 1.0,
            aggregate: 1.0,
            refine: 1.0,
        }),
    }
}
