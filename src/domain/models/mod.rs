pub mod artifact;
pub mod budget;
pub mod config;
pub mod graph;
pub mod metrics;
pub mod operation;
pub mod sample;
pub mod thought;
pub mod thresholds;
pub mod usage;

pub use artifact::{ArtifactEntry, OperationRecord, RunArtifact};
pub use budget::{Budget, Reservation};
pub use config::{
    Config, DatasetConfig, ExecutorSettings, LanguageModelConfig, LoggingConfig, OutputConfig,
};
pub use graph::{NodeId, OperationGraph, OperationNode};
pub use metrics::RunMetrics;
pub use operation::{Operation, OperationKind};
pub use sample::{Sample, SourceArticle};
pub use thought::{Provenance, ThoughtState};
pub use thresholds::{Stage, StageThresholds, ThresholdEntry, ThresholdTable};
pub use usage::{Pricing, TokenUsage};
