//! Corpus access
pub mod loader;

pub use loader::DatasetLoader;
