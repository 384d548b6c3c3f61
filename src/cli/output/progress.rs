//! Progress bar utilities using indicatif for terminal output
//!
//! One bar tracks the jobs of an experiment run; a spinner covers corpus
//! loading. Both draw to stderr so `--json` output on stdout stays clean.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::services::experiment_runner::{JobStatus, RunEvent};

/// Style templates for different progress bar types
const PROGRESS_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg} (ETA: {eta})";
const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";

/// Progress bar characters for visual effect
const PROGRESS_CHARS: &str = "█▓▒░ ";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Create a standard progress bar with ETA calculation
///
/// # Example
/// ```
/// use thoughtgraph::cli::output::progress::create_progress_bar;
///
/// let pb = create_progress_bar(12);
/// pb.inc(1);
/// pb.finish_with_message("done");
/// ```
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .expect("Invalid progress bar template")
            .progress_chars(PROGRESS_CHARS),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a spinner with a message
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .expect("Invalid spinner template")
            .tick_chars(SPINNER_CHARS),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.into());
    spinner
}

/// Extension trait for ProgressBar to add common utility methods
pub trait ProgressBarExt {
    /// Finish with a success message (green checkmark)
    fn finish_success(&self, message: impl Into<String>);

    /// Finish with a warning message (yellow !)
    fn finish_warning(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✓ {}", message.into()));
    }

    fn finish_warning(&self, message: impl Into<String>) {
        self.finish_with_message(format!("! {}", message.into()));
    }
}

/// Drive `pb` from an experiment's event stream until the stream closes.
pub fn track_run(pb: ProgressBar, mut events: mpsc::Receiver<RunEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RunEvent::Started { total_jobs } => pb.set_length(total_jobs as u64),
                RunEvent::JobStarted { sample_id, label } => {
                    pb.set_message(format!("{sample_id} {label}"));
                }
                RunEvent::JobFinished { status, .. } => {
                    if let JobStatus::Failed(reason) = status {
                        pb.println(format!("✗ {reason}"));
                    }
                    pb.inc(1);
                }
                RunEvent::BudgetDepleted { skipped_jobs } => {
                    pb.finish_warning(format!("budget depleted, {skipped_jobs} job(s) skipped"));
                }
                RunEvent::Finished { summary } => {
                    if !pb.is_finished() {
                        pb.finish_success(format!("spent {:.4}", summary.spent));
                    }
                }
            }
        }
    })
}
