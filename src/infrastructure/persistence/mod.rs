//! Results directory persistence
pub mod run_store;

pub use run_store::{RunRecord, RunStore};
