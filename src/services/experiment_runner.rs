//! Experiment runner.
//!
//! Runs every (sample, method, prompt-limit variant) job against one shared
//! budget. Jobs are launched in sample-major order, at most
//! `max_concurrency` at a time; the budget is checked before each launch and
//! no further job starts once it is depleted. Every finished job's artifact
//! is written to the run store, even when the budget cut it short.

use std::collections::BTreeMap;
use futures::future::join_all;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Budget, ExecutorSettings, RunMetrics, Sample, StageThresholds};
use crate::domain::ports::{LanguageModel, PromptContext};
use crate::infrastructure::persistence::{RunRecord, RunStore};
use crate::services::graph_executor::{ExecutionStatus, GraphExecutor};
use crate::services::graph_templates::{Method, ScorerSet};

/// One unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSpec {
    pub sample: usize,
    pub method: Method,
    pub variant: usize,
}

impl JobSpec {
    pub fn label(&self) -> String {
        RunStore::job_label(self.method.as_str(), self.variant)
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    /// Budget ran out mid-graph; a truncated artifact was written
    Partial,
    /// The graph could not be built or its artifact not written
    Failed(String),
}

/// Progress events emitted while running.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started { total_jobs: usize },
    JobStarted { sample_id: String, label: String },
    JobFinished { sample_id: String, label: String, status: JobStatus },
    BudgetDepleted { skipped_jobs: usize },
    Finished { summary: RunSummary },
}

/// Totals of one experiment run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub completed: usize,
    pub partial: usize,
    pub failed: usize,
    /// Jobs never launched because the budget was depleted
    pub skipped: usize,
    pub spent: f64,
    /// Metrics per `<method>_<variant>` label
    pub metrics: BTreeMap<String, RunMetrics>,
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct ExperimentPlan {
    pub samples: Vec<Sample>,
    pub methods: Vec<Method>,
    pub variants: Vec<usize>,
}

impl ExperimentPlan {
    /// Jobs in launch order: per sample, per method, per variant.
    pub fn jobs(&self) -> Vec<JobSpec> {
        let mut jobs = Vec::with_capacity(self.samples.len() * self.methods.len() * self.variants.len());
        for sample in 0..self.samples.len() {
            for &method in &self.methods {
                for &variant in &self.variants {
                    jobs.push(JobSpec {
                        sample,
                        method,
                        variant,
                    });
                }
            }
        }
        jobs
    }
}

/// Runs experiment plans.
pub struct ExperimentRunner {
    executor: GraphExecutor,
    language_model_name: String,
    scorers: ScorerSet,
    gates: StageThresholds,
    max_concurrency: usize,
}

impl ExperimentRunner {
    pub fn new(
        language_model: Arc<dyn LanguageModel>,
        budget: Budget,
        settings: ExecutorSettings,
        scorers: ScorerSet,
        gates: StageThresholds,
    ) -> Self {
        let language_model_name = language_model.name().to_string();
        Self {
            executor: GraphExecutor::new(language_model, budget, settings),
            language_model_name,
            scorers,
            gates,
            max_concurrency: 1,
        }
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub const fn budget(&self) -> &Budget {
        self.executor.budget()
    }

    /// Run `plan`, writing into `store`.
    pub async fn run(&self, plan: &ExperimentPlan, store: &RunStore) -> DomainResult<RunSummary> {
        // nobody listens; sends fail fast instead of filling the channel
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        self.run_with_events(plan, store, tx).await
    }

    /// Run `plan`, streaming progress events.
    #[instrument(skip_all, fields(samples = plan.samples.len(), root = %store.root().display()))]
    pub async fn run_with_events(
        &self,
        plan: &ExperimentPlan,
        store: &RunStore,
        event_tx: mpsc::Sender<RunEvent>,
    ) -> DomainResult<RunSummary> {
        let budget = self.executor.budget();
        store
            .write_record(&RunRecord {
                data: plan.samples.iter().map(|s| s.id.clone()).collect(),
                methods: plan.methods.iter().map(ToString::to_string).collect(),
                lm: self.language_model_name.clone(),
                budget: budget.initial(),
                variants: plan.variants.clone(),
            })
            .await?;

        let jobs = plan.jobs();
        let _ = event_tx.send(RunEvent::Started { total_jobs: jobs.len() }).await;

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(jobs.len());
        let mut summary = RunSummary::default();

        for (position, job) in jobs.iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| DomainError::InvalidParameter("job semaphore closed".to_string()))?;

            if budget.is_depleted() {
                summary.skipped = jobs.len() - position;
                let sample = &plan.samples[job.sample];
                error!(
                    sample = %sample.id,
                    method = %job.method,
                    skipped = summary.skipped,
                    "budget has been depleted, stopping; remaining jobs have not been run"
                );
                let _ = event_tx
                    .send(RunEvent::BudgetDepleted {
                        skipped_jobs: summary.skipped,
                    })
                    .await;
                break;
            }

            let sample = plan.samples[job.sample].clone();
            let job = *job;
            let executor = self.executor.clone();
            let scorers = self.scorers.clone();
            let gates = self.gates;
            let store = store.clone();
            let event_tx = event_tx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let label = job.label();
                let _ = event_tx
                    .send(RunEvent::JobStarted {
                        sample_id: sample.id.clone(),
                        label: label.clone(),
                    })
                    .await;

                let (status, metrics) = run_job(&executor, &scorers, &gates, &store, &sample, job).await;

                let _ = event_tx
                    .send(RunEvent::JobFinished {
                        sample_id: sample.id,
                        label: label.clone(),
                        status: status.clone(),
                    })
                    .await;
                (label, status, metrics)
            }));
        }

        for joined in join_all(handles).await {
            match joined {
                Ok((label, status, metrics)) => {
                    match status {
                        JobStatus::Completed => summary.completed += 1,
                        JobStatus::Partial => summary.partial += 1,
                        JobStatus::Failed(_) => summary.failed += 1,
                    }
                    summary.metrics.entry(label).or_default().merge(&metrics);
                }
                Err(e) => {
                    error!(error = %e, "job task panicked");
                    summary.failed += 1;
                }
            }
        }

        summary.spent = budget.spent();
        store.write_metrics(&summary.metrics).await?;

        info!(
            completed = summary.completed,
            partial = summary.partial,
            failed = summary.failed,
            skipped = summary.skipped,
            spent = summary.spent,
            "experiment finished"
        );
        let _ = event_tx
            .send(RunEvent::Finished {
                summary: summary.clone(),
            })
            .await;

        Ok(summary)
    }
}

async fn run_job(
    executor: &GraphExecutor,
    scorers: &ScorerSet,
    gates: &StageThresholds,
    store: &RunStore,
    sample: &Sample,
    job: JobSpec,
) -> (JobStatus, RunMetrics) {
    info!(
        sample = %sample.id,
        method = %job.method,
        variant = job.variant,
        remaining = executor.budget().remaining(),
        "running job"
    );

    let graph = match job.method.build(scorers, gates) {
        Ok(graph) => graph,
        Err(e) => {
            error!(method = %job.method, error = %e, "could not build graph");
            return (JobStatus::Failed(e.to_string()), RunMetrics::default());
        }
    };

    let seed = sample.seed_state(job.method.as_str());
    let prompt = PromptContext {
        prompt_token_limit: Some(job.variant),
    };
    let report = executor.execute(&graph, seed, prompt).await;

    let status = match &report.status {
        ExecutionStatus::Completed => JobStatus::Completed,
        ExecutionStatus::Partial { reason, .. } => {
            warn!(sample = %sample.id, method = %job.method, reason = %reason, "job cut short");
            JobStatus::Partial
        }
    };

    match store
        .write_artifact(&job.label(), sample.index, &report.to_artifact())
        .await
    {
        Ok(_) => (status, report.metrics),
        Err(e) => {
            error!(sample = %sample.id, error = %e, "could not write artifact");
            (JobStatus::Failed(e.to_string()), report.metrics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted_language_model::ScriptedLanguageModel;
    use crate::domain::models::{SourceArticle, ThoughtState};
    use crate::domain::ports::FnScorer;

    fn sample(index: usize) -> Sample {
        Sample {
            id: format!("PMC{index}"),
            index,
            article: SourceArticle::default(),
            references: BTreeMap::new(),
        }
    }

    fn scorers() -> ScorerSet {
        ScorerSet {
            intermediate: Arc::new(FnScorer::new("len", |s: &ThoughtState| Ok(s.current.len() as f64 / 100.0))),
            evaluation: Arc::new(FnScorer::new("one", |_: &ThoughtState| Ok(1.0))),
        }
    }

    const GATES: StageThresholds = StageThresholds {
        generate: 0.5,
        aggregate: 0.4,
        refine: 0.4,
    };

    fn plan(samples: usize, methods: Vec<Method>, variants: Vec<usize>) -> ExperimentPlan {
        ExperimentPlan {
            samples: (0..samples).map(sample).collect(),
            methods,
            variants,
        }
    }

    #[test]
    fn test_job_order() {
        let jobs = plan(2, vec![Method::Io, Method::Tot], vec![512, 1024]).jobs();
        assert_eq!(jobs.len(), 8);
        assert_eq!(
            jobs[0],
            JobSpec {
                sample: 0,
                method: Method::Io,
                variant: 512
            }
        );
        assert_eq!(jobs[3].method, Method::Tot);
        assert_eq!(jobs[4].sample, 1);
    }

    #[tokio::test]
    async fn test_run_writes_artifacts_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path());
        let lm = Arc::new(ScriptedLanguageModel::new().with_cost_per_call(0.01));
        let runner = ExperimentRunner::new(lm, Budget::new(10.0), ExecutorSettings::default(), scorers(), GATES)
            .with_max_concurrency(2);

        let summary = runner
            .run(&plan(2, vec![Method::Io, Method::Got], vec![256]), &store)
            .await
            .unwrap();

        assert_eq!(summary.completed, 4);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.metrics["io_256"].executions, 2);
        assert!(dir.path().join("got_256/1.json").exists());
        assert!(dir.path().join("config.json").exists());
        assert!(dir.path().join("metrics.json").exists());
        assert!((summary.spent - runner.budget().spent()).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_depleted_budget_skips_remaining_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path());
        let lm = Arc::new(ScriptedLanguageModel::new().with_cost_per_call(1.0));
        let runner = ExperimentRunner::new(lm.clone(), Budget::new(2.5), ExecutorSettings::default(), scorers(), GATES);

        let summary = runner
            .run(&plan(4, vec![Method::Io], vec![128]), &store)
            .await
            .unwrap();

        // third job overspends during generation and skips its scoring node
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.partial, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(lm.invocations(), 3);
        assert!(dir.path().join("io_128/2.json").exists());
        assert!(!dir.path().join("io_128/3.json").exists());
        assert_eq!(summary.metrics["io_128"].partial_executions, 1);
    }

    #[tokio::test]
    async fn test_events_stream() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path());
        let lm = Arc::new(ScriptedLanguageModel::new());
        let runner = ExperimentRunner::new(lm, Budget::new(1.0), ExecutorSettings::default(), scorers(), GATES);
        let (tx, mut rx) = mpsc::channel(100);

        runner
            .run_with_events(&plan(1, vec![Method::Cot], vec![64]), &store, tx)
            .await
            .unwrap();

        let mut finished = 0;
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::JobFinished { status, .. } => {
                    assert_eq!(status, JobStatus::Completed);
                    finished += 1;
                }
                RunEvent::Finished { summary } => assert_eq!(summary.completed, 1),
                _ => {}
            }
        }
        assert_eq!(finished, 1);
    }
}
