//! Adaptive batch scheduler.
//!
//! A feedback loop that paces generation against the memory budget. Each
//! iteration assesses memory, adjusts the row target, plans a window, then
//! builds and writes it.
//!
//! ```text
//!                 ┌──────────────┐
//!       ┌────────►│   PLANNING   │ assess memory
//!       │         └──────┬───────┘
//!       │                │
//!       │   ┌────────────┼─────────────┬──────────────┬──────────────┐
//!       │   ▼            ▼             ▼              ▼              ▼
//!       │ NORMAL    NORMAL, below   OBSERVATION   BUDGET_WARNING   ABORT / HARD STOP
//!       │ at max    max target      (freeze)      (shrink, pause)       │
//!       │   │            │             │              │                 ▼
//!       │   │       RECOVERING         │          THROTTLED        ┌─────────┐
//!       │   │      (grow after N)      │              │            │ ABORTED │
//!       │   ▼            ▼             ▼              ▼            └─────────┘
//!       │ ┌──────────────────────────────────────────────────┐
//!       │ │ GENERATING: plan window, build, write, aggregate │
//!       │ └────────────────────────┬─────────────────────────┘
//!       │                          │ cursor = window end + 1
//!       └──── cursor <= end ───────┤
//!                                  ▼ cursor > end
//!                             ┌────────┐
//!                             │  DONE  │
//!                             └────────┘
//! ```
//!
//! Pressure is answered at once; recovery needs a confirmed stable streak.
//! Batches run strictly one after another because overlapping batches would
//! corrupt the budget measurement.

use crate::planner::next_window;
use crate::report::{
    AbortReport, BatchRecord, RunMode, RunOutcome, RunReport, SchedulerPhase,
};
use crate::traits::{DatasetBuilder, Sink};
use cadence_budget::{BudgetReading, MemoryBudgetMonitor, MemoryProbe, Pauser};
use cadence_core::{BatchPolicy, BudgetStatus, CadenceResult, Date, DateWindow, RowCount};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drift beyond this many GB is reported.
pub const DRIFT_REPORT_GB: f64 = 0.5;

/// Mutable loop state, owned by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    pub cursor: Date,
    pub target_rows: RowCount,
    pub stable_count: u32,
    pub batch_index: u32,
    pub phase: SchedulerPhase,
}

impl SchedulerState {
    pub fn new(start: Date, initial_target: RowCount) -> Self {
        Self {
            cursor: start,
            target_rows: initial_target,
            stable_count: 0,
            batch_index: 0,
            phase: SchedulerPhase::Planning,
        }
    }

    /// Apply one classification to the row target and streak counter.
    ///
    /// Returns the phase for this iteration. Abort statuses leave the target
    /// untouched and return [`SchedulerPhase::Aborted`].
    pub fn react(&mut self, status: BudgetStatus, policy: &BatchPolicy) -> SchedulerPhase {
        self.phase = match status {
            BudgetStatus::GlobalHardStop | BudgetStatus::BudgetAbort => SchedulerPhase::Aborted,
            BudgetStatus::BudgetWarning => {
                self.stable_count = 0;
                let old = self.target_rows;
                self.target_rows = policy.shrink(self.target_rows);
                warn!(
                    from = old,
                    to = self.target_rows,
                    "Throttling batch target"
                );
                SchedulerPhase::Throttled
            }
            BudgetStatus::Observation => {
                self.stable_count = 0;
                SchedulerPhase::Generating
            }
            BudgetStatus::Normal if self.target_rows < policy.max_target_rows => {
                self.stable_count += 1;
                if self.stable_count >= policy.stable_iterations {
                    let old = self.target_rows;
                    self.target_rows = policy.grow(self.target_rows);
                    self.stable_count = 0;
                    info!(
                        from = old,
                        to = self.target_rows,
                        stable_iterations = policy.stable_iterations,
                        "Recovering batch target"
                    );
                }
                SchedulerPhase::Recovering
            }
            BudgetStatus::Normal => SchedulerPhase::Generating,
        };
        self.phase
    }
}

/// Memory-paced batch loop over one date range.
pub struct AdaptiveBatchScheduler {
    range: DateWindow,
    daily_average: RowCount,
    policy: BatchPolicy,
    cancel: Option<Arc<AtomicBool>>,
}

impl AdaptiveBatchScheduler {
    pub fn new(range: DateWindow, daily_average: RowCount, policy: BatchPolicy) -> Self {
        Self {
            range,
            daily_average,
            policy,
            cancel: None,
        }
    }

    /// Stop at the top of the next iteration once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run the loop to completion, abort or cancellation.
    ///
    /// Errors come only from the collaborators; memory pressure is reported
    /// through [`RunOutcome`].
    pub fn run<P, S, B, K>(
        &self,
        monitor: &mut MemoryBudgetMonitor<P, S>,
        builder: &mut B,
        sink: &mut K,
    ) -> CadenceResult<RunReport>
    where
        P: MemoryProbe,
        S: Pauser,
        B: DatasetBuilder,
        K: Sink<B::Relation>,
    {
        if !monitor.is_initialized() {
            monitor.initialize()?;
        }

        info!(
            range = %self.range,
            daily_average = self.daily_average,
            initial_target = self.policy.max_target_rows,
            "Batched generation started"
        );

        let mut report = RunReport::new(RunMode::Batched);
        let mut state = SchedulerState::new(self.range.start(), self.policy.max_target_rows);

        while state.cursor <= self.range.end() {
            if self.cancelled() {
                info!(batch = state.batch_index, "Generation cancelled");
                report.outcome = RunOutcome::Cancelled;
                break;
            }

            state.phase = SchedulerPhase::Planning;
            let reading = monitor.assess();
            log_drift(&reading);

            let phase = state.react(reading.status, &self.policy);
            match phase {
                SchedulerPhase::Aborted => {
                    let abort = AbortReport {
                        status: reading.status,
                        system_pct: reading.system_pct,
                        budget_usage_pct: reading.budget_usage_pct,
                        drift_gb: reading.drift_gb,
                        baseline_available_gb: monitor.state().baseline_available_gb,
                        remediation: AbortReport::remediation_for(reading.status).to_string(),
                    };
                    warn!(
                        status = %abort.status,
                        system_pct = abort.system_pct,
                        budget_pct = abort.budget_usage_pct,
                        drift_gb = abort.drift_gb,
                        baseline_available_gb = abort.baseline_available_gb,
                        batch = state.batch_index,
                        "Generation aborted: {}",
                        abort.remediation
                    );
                    report.outcome = RunOutcome::Aborted(abort);
                    break;
                }
                SchedulerPhase::Throttled => {
                    monitor.relieve(self.policy.relieve_threshold_pct, self.policy.relieve_wait());
                }
                _ => {
                    if reading.status == BudgetStatus::Observation {
                        info!(
                            budget_pct = reading.budget_usage_pct,
                            target_rows = state.target_rows,
                            "Budget under observation, holding batch target"
                        );
                    }
                }
            }

            let Some(plan) = next_window(
                state.cursor,
                self.range.end(),
                self.daily_average,
                state.target_rows,
            ) else {
                break;
            };

            info!(
                batch = state.batch_index + 1,
                window = %plan.window,
                target_rows = plan.target_rows,
                budget_pct = reading.budget_usage_pct,
                system_pct = reading.system_pct,
                "Generating batch"
            );

            let relations = builder.build_batch(plan.window)?;
            let mut rows_written = 0;
            for (table, relation) in relations {
                let receipt = sink.write(&table, relation, plan.target_rows, Some(state.batch_index))?;
                debug!(table = %table, rows = receipt.rows, part = state.batch_index, "Part written");
                rows_written += receipt.rows;
                report.record_write(&table, receipt);
            }

            report.batches.push(BatchRecord {
                index: state.batch_index,
                window: plan.window,
                target_rows: plan.target_rows,
                status: reading.status,
                phase,
                rows_written,
            });

            state.cursor = plan.next_cursor();
            state.batch_index += 1;
        }

        if report.outcome.is_completed() {
            state.phase = SchedulerPhase::Done;
            info!(
                batches = report.batches.len(),
                rows = report.total_rows(),
                "Batched generation finished"
            );
        }

        let peaks = monitor.state();
        report.peak_process_rss_gb = peaks.peak_process_rss_gb;
        report.peak_system_pct = peaks.peak_system_pct;
        Ok(report)
    }
}

fn log_drift(reading: &BudgetReading) {
    if reading.drift_gb > DRIFT_REPORT_GB {
        info!(drift_gb = reading.drift_gb, "External memory load grew");
    } else if reading.drift_gb < -DRIFT_REPORT_GB {
        info!(drift_gb = reading.drift_gb, "External memory released");
    }
}

// =============================================================================
// TESTS
// =============================================================================
