//! Domain layer for the thoughtgraph executor
//!
//! This module contains the graph, state and budget models and the ports
//! through which external capabilities are consumed.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{CalibrationError, CapabilityError, DomainError, DomainResult, GraphError};
