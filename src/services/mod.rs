//! Service layer: operation semantics, graph execution and experiment runs.

pub mod experiment_runner;
pub mod graph_executor;
pub mod graph_templates;
pub mod gumbel_calibrator;
pub mod operations;

pub use experiment_runner::{ExperimentPlan, ExperimentRunner, RunSummary};
pub use graph_executor::{ExecutionReport, ExecutionStatus, GraphExecutor};
pub use graph_templates::{Method, ScorerSet};
pub use gumbel_calibrator::GumbelParams;
