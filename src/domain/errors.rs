//! Domain errors for the thoughtgraph executor.

use thiserror::Error;

use super::models::graph::NodeId;

/// Errors raised while building an operation graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    #[error("Node {node} cannot depend on {predecessor}: predecessors must be appended first")]
    ForwardReference { node: NodeId, predecessor: NodeId },

    #[error("Node {0} cannot depend on itself")]
    SelfReference(NodeId),
}

/// Failure of an external capability invocation (generation or aggregation).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    /// The shared budget was depleted before the invocation started.
    #[error("Budget depleted (remaining {remaining:.4})")]
    BudgetExhausted { remaining: f64 },

    #[error("Invocation timed out after {0}s")]
    Timeout(u64),

    #[error("Capability failed: {0}")]
    Failed(String),
}

impl CapabilityError {
    /// Whether this failure means no further invocations may be attempted.
    pub const fn is_budget_exhausted(&self) -> bool {
        matches!(self, Self::BudgetExhausted { .. })
    }
}

/// Errors from fitting or querying the Gumbel calibrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("Calibration sample is empty")]
    EmptySample,

    #[error("Calibration sample contains a non-finite value: {0}")]
    NonFiniteSample(f64),

    #[error("Invalid variance: {0} (must be finite and non-negative)")]
    InvalidVariance(f64),

    #[error("Degenerate calibration sample: zero variance around mean {mean}")]
    DegenerateSample { mean: f64 },

    #[error("Invalid mean: {0} (must be finite)")]
    InvalidMean(f64),

    #[error("Invalid percentile: {0} (must lie strictly between 0 and 1)")]
    InvalidPercentile(f64),

    #[error("No threshold for stage '{stage}' at percentile {percentile}")]
    MissingThreshold { stage: String, percentile: f64 },
}

/// Domain-level errors that can occur in the thoughtgraph system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Invalid operation parameter: {0}")]
    InvalidParameter(String),

    #[error("Sample not found: {0}")]
    SampleNotFound(String),

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl AsRef<std::path::Path>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_display() {
        let err = GraphError::ForwardReference {
            node: NodeId(1),
            predecessor: NodeId(4),
        };
        assert_eq!(
            err.to_string(),
            "Node #1 cannot depend on #4: predecessors must be appended first"
        );
    }

    #[test]
    fn test_budget_exhausted_flag() {
        assert!(CapabilityError::BudgetExhausted { remaining: 0.0 }.is_budget_exhausted());
        assert!(!CapabilityError::Timeout(5).is_budget_exhausted());
        assert!(!CapabilityError::Failed("boom".into()).is_budget_exhausted());
    }

    #[test]
    fn test_domain_error_from_graph() {
        let err: DomainError = GraphError::SelfReference(NodeId(2)).into();
        assert!(matches!(err, DomainError::Graph(GraphError::SelfReference(NodeId(2)))));
    }
}
