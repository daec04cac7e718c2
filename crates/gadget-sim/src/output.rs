// crates/gadget-sim/src/output.rs
//
// Output formatting for simulation results.
// Supports table and JSON output modes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};

use gadget_core::{GadgetError, NodeId, WeightVector};
use gadget_engine::RunSummary;

/// Output format for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty-printed table output (default).
    #[default]
    Table,
    /// JSON output for machine consumption.
    Json,
}

impl FromStr for OutputFormat {
    type Err = GadgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(GadgetError::InvalidConfig(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

/// Final state of one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeModel {
    pub node: NodeId,
    pub iterations: u32,
    pub misclassified: usize,
    pub shard_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_accuracy: Option<f64>,
    pub weights: WeightVector,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub models: Vec<NodeModel>,
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    node: NodeId,
    #[tabled(rename = "Shard")]
    shard: usize,
    #[tabled(rename = "Iterations")]
    iterations: u32,
    #[tabled(rename = "Misclassified")]
    misclassified: usize,
    #[tabled(rename = "Dims")]
    dims: usize,
    #[tabled(rename = "|w|")]
    norm: String,
    #[tabled(rename = "Test acc")]
    test_accuracy: String,
}

/// Format a slice of Tabled items as a table string.
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    Table::new(data).to_string()
}

/// Format a serializable value as a pretty-printed JSON string.
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("JSON serialization error: {}", e))
}

/// Render a run report in the requested format.
pub fn render(report: &RunReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(report),
        OutputFormat::Table => {
            let rows: Vec<NodeRow> = report
                .models
                .iter()
                .map(|m| NodeRow {
                    node: m.node,
                    shard: m.shard_size,
                    iterations: m.iterations,
                    misclassified: m.misclassified,
                    dims: m.weights.len(),
                    norm: format!("{:.6}", m.weights.l2_norm()),
                    test_accuracy: m
                        .test_accuracy
                        .map(|a| format!("{:.4}", a))
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            format!("{}\n{}", summary_line(&report.summary), format_table(&rows))
        }
    }
}

fn summary_line(summary: &RunSummary) -> String {
    let spread = summary
        .final_observation
        .as_ref()
        .map(|o| format!("{:.3e}", o.max_std_dev))
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "variant={} nodes={} alive={} cycles={} iterations={} finished={} cancelled={} max_std_dev={} elapsed={}ms",
        summary.variant,
        summary.nodes,
        summary.alive_nodes,
        summary.cycles,
        summary.iterations_completed,
        summary.finished,
        summary.cancelled,
        spread,
        summary.elapsed_ms
    );
    if let Some(acc) = summary.test_accuracy {
        line.push_str(&format!(" test_accuracy={:.4}", acc));
    }
    line
}
