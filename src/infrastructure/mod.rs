//! Infrastructure layer module
//!
//! This module contains the adapters to the outside world:
//! - Configuration management
//! - Logging infrastructure
//! - Corpus loading
//! - Results persistence

pub mod config;
pub mod dataset;
pub mod logging;
pub mod persistence;
