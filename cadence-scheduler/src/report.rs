//! Run results.

use crate::traits::{TableLocation, WriteReceipt};
use cadence_core::{BudgetStatus, DateWindow, RowCount};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduler phase for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerPhase {
    Planning,
    Generating,
    Throttled,
    Recovering,
    Aborted,
    Done,
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerPhase::Planning => "PLANNING",
            SchedulerPhase::Generating => "GENERATING",
            SchedulerPhase::Throttled => "THROTTLED",
            SchedulerPhase::Recovering => "RECOVERING",
            SchedulerPhase::Aborted => "ABORTED",
            SchedulerPhase::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// How the run was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Monolithic,
    Batched,
}

/// The metrics that stopped a run, and what the operator should do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortReport {
    pub status: BudgetStatus,
    pub system_pct: f64,
    pub budget_usage_pct: f64,
    pub drift_gb: f64,
    pub baseline_available_gb: f64,
    pub remediation: String,
}

impl AbortReport {
    /// Remediation text for an abort status.
    pub fn remediation_for(status: BudgetStatus) -> &'static str {
        match status {
            BudgetStatus::GlobalHardStop => {
                "system memory is nearly exhausted by other processes; free memory elsewhere or retry later"
            }
            _ => "this run consumed most of its memory budget; reduce daily_avg_transactions or the date range",
        }
    }
}

impl fmt::Display for AbortReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: system {:.1}%, budget {:.1}%, drift {:+.2} GB, baseline available {:.2} GB ({})",
            self.status,
            self.system_pct,
            self.budget_usage_pct,
            self.drift_gb,
            self.baseline_available_gb,
            self.remediation
        )
    }
}

/// Terminal state of a run. Aborts and cancellations are not errors; the
/// tables written before them are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Aborted(AbortReport),
    Cancelled,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Aggregate for one table across all writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: RowCount,
    pub parts: u32,
    pub location: TableLocation,
}

impl TableSummary {
    pub fn is_partitioned(&self) -> bool {
        self.parts > 1 || self.location.is_partitioned()
    }
}

/// One executed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub index: u32,
    pub window: DateWindow,
    pub target_rows: RowCount,
    pub status: BudgetStatus,
    pub phase: SchedulerPhase,
    pub rows_written: RowCount,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub outcome: RunOutcome,
    pub tables: Vec<TableSummary>,
    pub batches: Vec<BatchRecord>,
    pub peak_process_rss_gb: f64,
    pub peak_system_pct: f64,
}

impl RunReport {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            outcome: RunOutcome::Completed,
            tables: Vec::new(),
            batches: Vec::new(),
            peak_process_rss_gb: 0.0,
            peak_system_pct: 0.0,
        }
    }

    /// Fold a write into the per-table aggregate, in first-seen order.
    pub fn record_write(&mut self, table: &str, receipt: WriteReceipt) {
        match self.tables.iter_mut().find(|t| t.name == table) {
            Some(summary) => {
                summary.rows += receipt.rows;
                summary.parts += 1;
                summary.location = receipt.location;
            }
            None => self.tables.push(TableSummary {
                name: table.to_string(),
                rows: receipt.rows,
                parts: 1,
                location: receipt.location,
            }),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn total_rows(&self) -> RowCount {
        self.tables.iter().map(|t| t.rows).sum()
    }
}
