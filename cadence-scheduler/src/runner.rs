//! Generation runner: picks a single pass or the adaptive scheduler.

use crate::report::{AbortReport, BatchRecord, RunMode, RunOutcome, RunReport, SchedulerPhase};
use crate::scheduler::AdaptiveBatchScheduler;
use crate::traits::{DatasetBuilder, Sink};
use cadence_budget::{MemoryBudgetMonitor, MemoryProbe, Pauser};
use cadence_core::{CadenceResult, GenerationConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Runs one validated configuration.
pub struct GenerationRunner<'a> {
    config: &'a GenerationConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> GenerationRunner<'a> {
    pub fn new(config: &'a GenerationConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// True when the estimated volume exceeds the batching threshold.
    pub fn uses_batching(&self) -> bool {
        self.config.estimated_total_rows() > self.config.batching.batching_threshold_rows
    }

    /// Validate, then generate the whole range.
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
        self.config.validate()?;

        if self.uses_batching() {
            info!(
                estimated_rows = self.config.estimated_total_rows(),
                threshold = self.config.batching.batching_threshold_rows,
                "Volume above batching threshold, pacing against memory budget"
            );
            let mut scheduler = AdaptiveBatchScheduler::new(
                self.config.window()?,
                self.config.daily_avg_transactions,
                self.config.batching.clone(),
            );
            if let Some(flag) = &self.cancel {
                scheduler = scheduler.with_cancel_flag(Arc::clone(flag));
            }
            scheduler.run(monitor, builder, sink)
        } else {
            self.run_monolithic(monitor, builder, sink)
        }
    }

    fn run_monolithic<P, S, B, K>(
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
        let mut report = RunReport::new(RunMode::Monolithic);
        if !monitor.is_initialized() {
            monitor.initialize()?;
        }

        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            report.outcome = RunOutcome::Cancelled;
            return Ok(report);
        }

        let reading = monitor.assess();
        if reading.status.is_abort() {
            let abort = AbortReport {
                status: reading.status,
                system_pct: reading.system_pct,
                budget_usage_pct: reading.budget_usage_pct,
                drift_gb: reading.drift_gb,
                baseline_available_gb: monitor.state().baseline_available_gb,
                remediation: AbortReport::remediation_for(reading.status).to_string(),
            };
            warn!(status = %abort.status, system_pct = abort.system_pct, "Generation aborted before start");
            report.outcome = RunOutcome::Aborted(abort);
            return Ok(report);
        }

        let window = self.config.window()?;
        let estimated_rows = self.config.estimated_total_rows();
        info!(
            window = %window,
            estimated_rows,
            budget_pct = reading.budget_usage_pct,
            system_pct = reading.system_pct,
            "Single-pass generation started"
        );

        let mut rows_written = 0;
        for (table, relation) in builder.build_batch(window)? {
            let receipt = sink.write(&table, relation, estimated_rows, None)?;
            info!(table = %table, rows = receipt.rows, location = %receipt.location, "Table written");
            rows_written += receipt.rows;
            report.record_write(&table, receipt);
        }

        report.batches.push(BatchRecord {
            index: 0,
            window,
            target_rows: estimated_rows,
            status: reading.status,
            phase: SchedulerPhase::Generating,
            rows_written,
        });

        let peaks = monitor.state();
        report.peak_process_rss_gb = peaks.peak_process_rss_gb;
        report.peak_system_pct = peaks.peak_system_pct;
        Ok(report)
    }
}
