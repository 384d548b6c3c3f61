//! Table output formatting for CLI commands
//!
//! Renders run metrics and calibrated thresholds using comfy-table.

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::collections::BTreeMap;
use std::env;

use crate::domain::models::{RunMetrics, ThresholdEntry};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per `<method>_<variant>` label
    pub fn format_metrics(&self, metrics: &BTreeMap<String, RunMetrics>) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "Job",
            "Runs",
            "Partial",
            "Calls",
            "Failed calls",
            "Score failures",
            "Gate exits",
            "Skipped merges",
            "Mean secs",
        ]));

        for (label, m) in metrics {
            let partial = if self.use_colors && m.partial_executions > 0 {
                Cell::new(m.partial_executions).fg(Color::Yellow)
            } else {
                Cell::new(m.partial_executions)
            };
            table.add_row(vec![
                Cell::new(label),
                number(m.executions),
                partial.set_alignment(CellAlignment::Right),
                number(m.invocations),
                number(m.failed_invocations),
                number(m.scoring_failures),
                number(m.gate_exits),
                number(m.skipped_aggregations),
                Cell::new(format!("{:.2}", m.mean_elapsed_secs())).set_alignment(CellAlignment::Right),
            ]);
        }

        table.to_string()
    }

    /// One row per `(stage, percentile)` entry
    pub fn format_thresholds(&self, entries: &[ThresholdEntry]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Stage", "Percentile", "Threshold"]));

        for entry in entries {
            table.add_row(vec![
                Cell::new(entry.stage),
                Cell::new(format!("{:.2}", entry.percentile)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4}", entry.threshold)).set_alignment(CellAlignment::Right),
            ]);
        }

        table.to_string()
    }

    /// Create a base table with common settings
    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        // Use UTF-8 preset for nice borders
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).add_attribute(Attribute::Bold))
        .collect()
}

fn number(value: u64) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

/// Check if color output is supported
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Stage;

    #[test]
    fn test_format_metrics() {
        let formatter = TableFormatter::with_config(false, Some(160));
        let metrics = BTreeMap::from([(
            "dgot_4096".to_string(),
            RunMetrics {
                executions: 2,
                partial_executions: 1,
                invocations: 14,
                gate_exits: 3,
                elapsed_secs: 5.0,
                ..Default::default()
            },
        )]);

        let output = formatter.format_metrics(&metrics);
        assert!(output.contains("dgot_4096"));
        assert!(output.contains("Gate exits"));
        assert!(output.contains("2.50"));
    }

    #[test]
    fn test_format_thresholds() {
        let formatter = TableFormatter::with_config(false, None);
        let output = formatter.format_thresholds(&[ThresholdEntry {
            stage: Stage::Aggregate,
            percentile: 0.5,
            threshold: 0.4436,
        }]);
        assert!(output.contains("aggregate"));
        assert!(output.contains("0.50"));
        assert!(output.contains("0.4436"));
    }

    #[test]
    fn test_no_color_env() {
        temp_env::with_var("NO_COLOR", Some("1"), || {
            assert!(!supports_color());
        });
    }
}
