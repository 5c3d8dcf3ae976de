//! Plain-text rendering of estimates, reports and run listings.

use crate::output::{format_size, RunInfo};
use cadence_budget::SizeEstimate;
use cadence_scheduler::{RunOutcome, RunReport};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

pub fn render_estimate(estimate: &SizeEstimate) -> String {
    format!(
        "Estimate approved: {} days | ~{} rows | ~{:.2} GB",
        estimate.days, estimate.total_rows, estimate.estimated_gb
    )
}

/// Per-table rows and locations, the outcome line and the memory peaks.
pub fn render_report(report: &RunReport, run_dir: &Path, size_bytes: u64) -> String {
    let mut out = String::new();
    let name_width = report
        .tables
        .iter()
        .map(|t| t.name.len())
        .max()
        .unwrap_or(0)
        .max("Table".len());

    let _ = writeln!(out, "{:<name_width$}  {:>14}  Location", "Table", "Rows");
    for table in &report.tables {
        let _ = writeln!(
            out,
            "{:<name_width$}  {:>14}  {}",
            table.name, table.rows, table.location
        );
    }

    let status = match &report.outcome {
        RunOutcome::Completed => "Completed".to_string(),
        RunOutcome::Cancelled => "Cancelled; tables above are partial".to_string(),
        RunOutcome::Aborted(abort) => format!("Aborted: {}", abort),
    };
    let _ = writeln!(out, "{}", status);
    let _ = writeln!(
        out,
        "Path: {} | Size: {} | Batches: {}",
        run_dir.display(),
        format_size(size_bytes),
        report.batches.len()
    );
    let _ = writeln!(
        out,
        "Peak RAM: process {:.2} GB | system {:.1}%",
        report.peak_process_rss_gb, report.peak_system_pct
    );
    out
}

pub fn render_runs(runs: &BTreeMap<String, Vec<RunInfo>>) -> String {
    if runs.is_empty() {
        return "No datasets found".to_string();
    }
    let mut out = String::new();
    for (domain, list) in runs {
        for run in list {
            let _ = writeln!(out, "{:<12} {:<17} {:>12}", domain, run.run_id, format_size(run.size_bytes));
        }
    }
    out
}
