//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::calibrate::CalibrateArgs;
use crate::cli::commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "thoughtgraph")]
#[command(about = "Budget-bounded graph-of-operations executor", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (replaces .thoughtgraph/config.yaml and local.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run methods over a range of corpus samples
    Run(RunArgs),

    /// Calibrate score-gate thresholds
    Calibrate(CalibrateArgs),
}
