//! Thoughtgraph - budget-bounded graph-of-operations executor
//!
//! Thoughtgraph refines text drafts by running a directed acyclic graph of
//! operations (generate, score, keep-best, aggregate and their score-gated
//! adaptive variants) against a language model, under one shared spending
//! budget. Gate thresholds for the adaptive operations are calibrated offline
//! by fitting a Gumbel distribution to best-of-k score samples.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): thought states, operations, graphs, the
//!   budget and the capability ports
//! - **Service Layer** (`services`): operation semantics, graph execution,
//!   method templates, calibration and experiment runs
//! - **Adapters** (`adapters`): language-model and scorer implementations
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging,
//!   corpus loading and results persistence
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use thoughtgraph::{GraphExecutor, Method};
//!
//! let graph = Method::Got.build(&scorers, &gates)?;
//! let report = executor.execute(&graph, seed, PromptContext::default()).await;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Budget, Config, ExecutorSettings, LoggingConfig, Operation, OperationGraph, RunArtifact,
    RunMetrics, StageThresholds, ThoughtState, ThresholdTable,
};
pub use domain::ports::{LanguageModel, PromptContext, Scorer};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ExecutionReport, ExecutionStatus, GraphExecutor, GumbelParams, Method, ScorerSet};
