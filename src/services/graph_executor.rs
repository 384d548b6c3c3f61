//! Graph executor.
//!
//! Runs an [`OperationGraph`] once over a seed state. Nodes execute in
//! append order, which is a topological order; each node receives the
//! concatenation of its predecessors' outputs (the seed for root nodes).
//! The shared [`Budget`] is checked before every node and every invocation;
//! once it is depleted the rest of the graph is abandoned and the execution
//! reported as partial.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::domain::models::{
    Budget, ExecutorSettings, NodeId, OperationGraph, OperationRecord, RunArtifact, RunMetrics,
    ThoughtState, TokenUsage,
};
use crate::domain::ports::{LanguageModel, PromptContext};
use crate::services::operations::{self, OperationContext, OperationOutput};

/// Outcome of one graph execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Every node ran.
    Completed,
    /// The graph was abandoned; nodes from `halted_at` on produced nothing.
    Partial { halted_at: NodeId, reason: String },
}

/// Everything one execution produced.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub status: ExecutionStatus,
    /// One record per executed node, in execution order
    pub records: Vec<OperationRecord>,
    pub usage: TokenUsage,
    pub metrics: RunMetrics,
}

impl ExecutionReport {
    pub fn is_partial(&self) -> bool {
        matches!(self.status, ExecutionStatus::Partial { .. })
    }

    /// Output of the last executed node.
    pub fn final_states(&self) -> &[ThoughtState] {
        self.records.last().map_or(&[], |r| r.thoughts.as_slice())
    }

    pub fn to_artifact(&self) -> RunArtifact {
        RunArtifact {
            records: self.records.clone(),
            summary: self.usage,
        }
    }
}

/// Executes operation graphs against a language model.
#[derive(Clone)]
pub struct GraphExecutor {
    language_model: Arc<dyn LanguageModel>,
    budget: Budget,
    settings: ExecutorSettings,
}

impl GraphExecutor {
    pub fn new(language_model: Arc<dyn LanguageModel>, budget: Budget, settings: ExecutorSettings) -> Self {
        Self {
            language_model,
            budget,
            settings,
        }
    }

    pub const fn budget(&self) -> &Budget {
        &self.budget
    }

    /// Run `graph` once, starting from `seed`.
    #[instrument(skip_all, fields(nodes = graph.len(), method = %seed.provenance().method))]
    pub async fn execute(
        &self,
        graph: &OperationGraph,
        seed: ThoughtState,
        prompt: PromptContext,
    ) -> ExecutionReport {
        let started = Instant::now();
        let mut ctx = OperationContext::new(self.language_model.as_ref(), &self.budget, &self.settings, prompt);
        let mut outputs: Vec<Vec<ThoughtState>> = Vec::with_capacity(graph.len());
        let mut records = Vec::with_capacity(graph.len());
        let mut status = ExecutionStatus::Completed;

        for node in graph.nodes() {
            if ctx.budget_depleted() {
                info!(node = %node.id, remaining = self.budget.remaining(), "budget depleted, abandoning graph");
                status = ExecutionStatus::Partial {
                    halted_at: node.id,
                    reason: "budget depleted before node".to_string(),
                };
                break;
            }

            let inputs = if node.is_root() {
                vec![seed.clone()]
            } else {
                node.predecessors()
                    .iter()
                    .flat_map(|p| outputs.get(p.0).into_iter().flatten().cloned())
                    .collect()
            };
            let kind = node.operation.kind();
            debug!(node = %node.id, operation = %kind, inputs = inputs.len(), "executing node");

            let output = match operations::execute(&node.operation, inputs, &mut ctx).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(node = %node.id, operation = %kind, error = %e, "node failed, continuing with no output");
                    OperationOutput::default()
                }
            };

            records.push(OperationRecord::new(kind, output.states.clone()));
            outputs.push(output.states);

            if output.budget_exhausted {
                info!(node = %node.id, "budget depleted during node, abandoning graph");
                status = ExecutionStatus::Partial {
                    halted_at: NodeId(node.id.0 + 1),
                    reason: format!("budget depleted during {kind}"),
                };
                break;
            }
        }

        let usage = *ctx.usage();
        let mut metrics = ctx.metrics().clone();
        metrics.executions = 1;
        metrics.partial_executions = u64::from(status != ExecutionStatus::Completed);
        metrics.elapsed_secs = started.elapsed().as_secs_f64();

        info!(
            status = ?status,
            invocations = metrics.invocations,
            cost = usage.cost,
            elapsed_secs = metrics.elapsed_secs,
            "graph execution finished"
        );

        ExecutionReport {
            status,
            records,
            usage,
            metrics,
        }
    }
}
