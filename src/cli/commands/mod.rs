//! CLI command implementations.

pub mod calibrate;
pub mod run;
