//! Calibrate CLI command.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Stage, ThresholdEntry, ThresholdTable};
use crate::infrastructure::persistence::RunStore;
use crate::services::gumbel_calibrator::{calibrate_table, stage_samples, GumbelParams};

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Run directory whose artifacts provide the score samples
    #[arg(long, conflicts_with_all = ["mean", "variance"])]
    pub results_dir: Option<PathBuf>,

    /// Mean of the best-of-k score distribution
    #[arg(long, requires = "variance")]
    pub mean: Option<f64>,

    /// Variance of the best-of-k score distribution
    #[arg(long, requires = "mean")]
    pub variance: Option<f64>,

    /// Percentiles to tabulate, each in (0, 1)
    #[arg(
        short,
        long = "percentile",
        value_delimiter = ',',
        default_values_t = [0.25, 0.5, 0.75]
    )]
    pub percentiles: Vec<f64>,

    /// Write the table as YAML (the `thresholds` section of the config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, serde::Serialize)]
pub struct CalibrationOutput {
    /// Number of score samples behind each stage
    pub samples: BTreeMap<Stage, usize>,
    pub thresholds: Vec<ThresholdEntry>,
    pub written_to: Option<PathBuf>,
}

impl CommandOutput for CalibrationOutput {
    fn to_human(&self) -> String {
        if self.thresholds.is_empty() {
            return "No score samples found.".to_string();
        }

        let mut lines = Vec::new();
        if !self.samples.is_empty() {
            let counts: Vec<String> = self
                .samples
                .iter()
                .map(|(stage, n)| format!("{stage}: {n}"))
                .collect();
            lines.push(format!("Samples per stage: {}", counts.join(", ")));
        }
        lines.push(TableFormatter::new().format_thresholds(&self.thresholds));
        if let Some(path) = &self.written_to {
            lines.push(format!("Thresholds written to {}", path.display()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: CalibrateArgs, json_mode: bool) -> Result<()> {
    let (table, samples) = match (&args.results_dir, args.mean, args.variance) {
        (Some(dir), _, _) => from_results(dir, &args.percentiles)?,
        (None, Some(mean), Some(variance)) => (from_moments(mean, variance, &args.percentiles)?, BTreeMap::new()),
        _ => bail!("Provide either --results-dir or both --mean and --variance"),
    };

    if let Some(path) = &args.output {
        let yaml = serde_yaml::to_string(&table).context("Failed to serialize thresholds")?;
        tokio::fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let result = CalibrationOutput {
        samples,
        thresholds: table.entries().to_vec(),
        written_to: args.output,
    };
    output(&result, json_mode);

    Ok(())
}

fn from_results(dir: &Path, percentiles: &[f64]) -> Result<(ThresholdTable, BTreeMap<Stage, usize>)> {
    let artifacts = RunStore::open(dir)
        .load_artifacts()
        .with_context(|| format!("Failed to read run artifacts in {}", dir.display()))?;
    let samples = stage_samples(&artifacts);
    let table = calibrate_table(&samples, percentiles).context("Calibration failed")?;
    let counts = samples.iter().map(|(stage, v)| (*stage, v.len())).collect();
    Ok((table, counts))
}

/// One distribution for every stage.
fn from_moments(mean: f64, variance: f64, percentiles: &[f64]) -> Result<ThresholdTable> {
    let params = GumbelParams::from_moments(mean, variance).context("Invalid moments")?;
    let mut table = ThresholdTable::empty();
    for &p in percentiles {
        let threshold = params.threshold(p).context("Invalid percentile")?;
        for stage in Stage::ALL {
            table.insert(stage, p, threshold);
        }
    }
    Ok(table)
}
