//! Gumbel threshold calibration.
//!
//! Best-of-k scores are maxima, so their distribution is modelled as a
//! Gumbel (extreme value type I, max-domain) law fitted by the method of
//! moments:
//!
//! ```text
//! beta = sqrt(6 * variance) / pi
//! mu   = mean - γ * beta
//! threshold(p) = mu - beta * ln(-ln(p))      p in (0, 1)
//! ```
//!
//! `threshold` is the quantile function, so gates calibrated at a higher
//! percentile are stricter. Everything here is pure and runs offline; the
//! executor only ever sees the frozen values in a [`ThresholdTable`].

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

use crate::domain::errors::CalibrationError;
use crate::domain::models::{OperationKind, RunArtifact, Stage, ThresholdTable};

/// Euler–Mascheroni constant.
pub const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Fitted Gumbel location and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GumbelParams {
    pub mu: f64,
    pub beta: f64,
}

impl GumbelParams {
    /// Method-of-moments fit from a sample mean and variance.
    ///
    /// A zero variance has no scale, so every percentile would collapse onto
    /// the mean; it is rejected rather than fitted.
    pub fn from_moments(mean: f64, variance: f64) -> Result<Self, CalibrationError> {
        if !mean.is_finite() {
            return Err(CalibrationError::InvalidMean(mean));
        }
        if !variance.is_finite() || variance < 0.0 {
            return Err(CalibrationError::InvalidVariance(variance));
        }
        let beta = (6.0 * variance).sqrt() / PI;
        if beta <= 0.0 {
            return Err(CalibrationError::DegenerateSample { mean });
        }
        Ok(Self {
            mu: EULER_GAMMA.mul_add(-beta, mean),
            beta,
        })
    }

    /// Fit directly from observed best-of-k maxima.
    pub fn fit(samples: &[f64]) -> Result<Self, CalibrationError> {
        let (mean, variance) = sample_moments(samples)?;
        // Rounding in the mean leaves a constant sample with a tiny non-zero
        // variance.
        if samples.windows(2).all(|w| w[0] == w[1]) {
            return Err(CalibrationError::DegenerateSample { mean });
        }
        Self::from_moments(mean, variance)
    }

    /// Score below which a best-of-k maximum falls with probability `p`.
    pub fn threshold(&self, p: f64) -> Result<f64, CalibrationError> {
        if !(p > 0.0 && p < 1.0) {
            return Err(CalibrationError::InvalidPercentile(p));
        }
        Ok(self.beta.mul_add(-(-p.ln()).ln(), self.mu))
    }

    /// Cumulative distribution function.
    pub fn cdf(&self, x: f64) -> f64 {
        (-(-(x - self.mu) / self.beta).exp()).exp()
    }

    /// Kolmogorov-Smirnov distance between the fitted law and `samples`.
    pub fn ks_distance(&self, samples: &[f64]) -> f64 {
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len() as f64;
        sorted
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let fitted = self.cdf(x);
                let below = i as f64 / n;
                let at_or_below = (i + 1) as f64 / n;
                (fitted - below).abs().max((at_or_below - fitted).abs())
            })
            .fold(0.0, f64::max)
    }
}

/// Mean and population variance of `samples`.
pub fn sample_moments(samples: &[f64]) -> Result<(f64, f64), CalibrationError> {
    if samples.is_empty() {
        return Err(CalibrationError::EmptySample);
    }
    if let Some(&bad) = samples.iter().find(|v| !v.is_finite()) {
        return Err(CalibrationError::NonFiniteSample(bad));
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Ok((mean, variance))
}

/// Stage whose candidates a score record rates, given the language-model
/// operation that produced them.
fn stage_for(producer: OperationKind, after_aggregation: bool) -> Option<Stage> {
    match producer {
        OperationKind::Aggregate | OperationKind::DAggregate => Some(Stage::Aggregate),
        OperationKind::Generate | OperationKind::DGenerateScore if after_aggregation => {
            Some(Stage::Refine)
        }
        OperationKind::Generate | OperationKind::DGenerateScore => Some(Stage::Generate),
        OperationKind::Score | OperationKind::KeepBestN => None,
    }
}

/// Per-stage best-of-k maxima extracted from persisted run artifacts.
///
/// A score record is attributed to a stage by the last language-model
/// operation before it: aggregation scores the aggregate stage, generation
/// scores the generate stage, or the refine stage once an aggregation has
/// run. Only the first record per stage counts, so later generation rounds
/// of a tree search do not pose as first-round candidates. The terminal
/// score record is the evaluation and is ignored. Each counted record
/// contributes the maximum of its scores.
pub fn stage_samples(artifacts: &[RunArtifact]) -> BTreeMap<Stage, Vec<f64>> {
    let mut samples: BTreeMap<Stage, Vec<f64>> = BTreeMap::new();

    for artifact in artifacts {
        let terminal = artifact
            .records
            .iter()
            .rposition(|r| r.operation == OperationKind::Score);
        let mut producer = None;
        let mut after_aggregation = false;
        let mut seen = BTreeSet::new();

        for (index, record) in artifact.records.iter().enumerate() {
            let kind = record.operation;
            if kind.invokes_language_model() {
                after_aggregation |= matches!(kind, OperationKind::Aggregate | OperationKind::DAggregate);
                producer = Some(kind);
                continue;
            }
            if kind != OperationKind::Score || Some(index) == terminal {
                continue;
            }
            let Some(stage) = producer.take().and_then(|p| stage_for(p, after_aggregation)) else {
                continue;
            };
            if !seen.insert(stage) {
                continue;
            }

            let best = record
                .scores
                .iter()
                .flatten()
                .copied()
                .filter(|v| v.is_finite())
                .reduce(f64::max);
            if let Some(best) = best {
                samples.entry(stage).or_default().push(best);
            }
        }
    }

    samples
}

/// Fit every stage and tabulate its threshold at each percentile.
pub fn calibrate_table(
    samples: &BTreeMap<Stage, Vec<f64>>,
    percentiles: &[f64],
) -> Result<ThresholdTable, CalibrationError> {
    let mut table = ThresholdTable::empty();
    for (&stage, values) in samples {
        let params = GumbelParams::fit(values)?;
        tracing::info!(
            stage = %stage,
            samples = values.len(),
            mu = params.mu,
            beta = params.beta,
            ks_distance = params.ks_distance(values),
            "fitted gumbel parameters"
        );
        for &p in percentiles {
            table.insert(stage, p, params.threshold(p)?);
        }
    }
    Ok(table)
}
