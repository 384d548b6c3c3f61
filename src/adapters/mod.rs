//! Capability implementations for the domain ports.

pub mod offline_language_model;
pub mod overlap_scorer;
pub mod scripted_language_model;
