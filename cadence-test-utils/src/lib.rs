//! Cadence Test Utilities
//!
//! Shared test infrastructure for the Cadence workspace:
//! - Scripted memory probe and no-op pauser for deterministic monitors
//! - Recording sink and stub dataset builder for scheduler scenarios
//! - Proptest generators for dates, windows and profile parameters
//! - Fixtures and custom assertions

pub use cadence_budget::{
    BudgetReading, MemoryBudgetMonitor, MemoryProbe, MemoryReading, Pauser,
};
pub use cadence_core::{
    BatchPolicy, BudgetPolicy, BudgetStatus, CadenceError, CadenceResult, Date, DateWindow,
    GenerationConfig, RowCount, BYTES_PER_GB,
};
pub use cadence_scheduler::{DatasetBuilder, DynMonitor, Sink, TableLocation, WriteReceipt};

use cadence_core::BuildError;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// MEMORY FAKES
// ============================================================================

/// Replays readings in order; once exhausted, repeats the last one.
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    script: VecDeque<MemoryReading>,
    last: MemoryReading,
    reads: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(readings: Vec<MemoryReading>) -> Self {
        let last = readings
            .first()
            .copied()
            .unwrap_or_else(|| fixtures::reading(fixtures::BASELINE_AVAILABLE_GB, fixtures::BASELINE_RSS_GB, 40.0));
        Self {
            script: readings.into(),
            last,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A baseline reading followed by one reading per status.
    ///
    /// Warning statuses get a second identical reading, consumed by the
    /// scheduler's `relieve` call in the same iteration.
    pub fn from_statuses(statuses: &[BudgetStatus]) -> Self {
        let mut readings = vec![fixtures::baseline()];
        for status in statuses {
            let reading = fixtures::reading_for(*status);
            readings.push(reading);
            if *status == BudgetStatus::BudgetWarning {
                readings.push(reading);
            }
        }
        Self::new(readings)
    }

    /// Shared counter of `read` calls, usable after the probe is moved.
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl MemoryProbe for ScriptedProbe {
    fn read(&mut self) -> MemoryReading {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
    }
}

/// Records pause requests instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct NoopPauser {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl NoopPauser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses requested so far, across clones.
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Pauser for NoopPauser {
    fn pause(&mut self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
    }
}

/// Monitor over a scripted probe with the default policy and a no-op pauser.
pub fn scripted_monitor(
    statuses: &[BudgetStatus],
) -> (MemoryBudgetMonitor<ScriptedProbe, NoopPauser>, NoopPauser) {
    let pauser = NoopPauser::new();
    let monitor = MemoryBudgetMonitor::new(ScriptedProbe::from_statuses(statuses), BudgetPolicy::default())
        .with_pauser(pauser.clone());
    (monitor, pauser)
}

/// [`scripted_monitor`] with the probe and pauser boxed, as domain handlers take it.
pub fn dyn_monitor(statuses: &[BudgetStatus]) -> (DynMonitor, NoopPauser) {
    let pauser = NoopPauser::new();
    let monitor: DynMonitor = MemoryBudgetMonitor::new(
        Box::new(ScriptedProbe::from_statuses(statuses)) as Box<dyn MemoryProbe + Send>,
        BudgetPolicy::default(),
    )
    .with_pauser(Box::new(pauser.clone()) as Box<dyn Pauser + Send>);
    (monitor, pauser)
}

// ============================================================================
// COLLABORATOR FAKES
// ============================================================================

/// One call observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub table: String,
    pub rows: RowCount,
    pub estimated_rows: RowCount,
    pub part_id: Option<u32>,
}

/// Sink that keeps a log of every write and persists nothing.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub writes: Vec<RecordedWrite>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, table: &str, rows: RowCount, estimated_rows: RowCount, part_id: Option<u32>) -> WriteReceipt {
        self.writes.push(RecordedWrite {
            table: table.to_string(),
            rows,
            estimated_rows,
            part_id,
        });
        let location = match part_id {
            Some(_) => TableLocation::Partitioned(table.into()),
            None => TableLocation::Memory(table.to_string()),
        };
        WriteReceipt { location, rows }
    }

    pub fn writes_for(&self, table: &str) -> Vec<&RecordedWrite> {
        self.writes.iter().filter(|w| w.table == table).collect()
    }
}

/// Relations that are just a row count.
impl Sink<RowCount> for RecordingSink {
    fn write(
        &mut self,
        table: &str,
        relation: RowCount,
        estimated_rows: RowCount,
        part_id: Option<u32>,
    ) -> CadenceResult<WriteReceipt> {
        Ok(self.record(table, relation, estimated_rows, part_id))
    }
}

impl<T> Sink<Vec<T>> for RecordingSink {
    fn write(
        &mut self,
        table: &str,
        relation: Vec<T>,
        estimated_rows: RowCount,
        part_id: Option<u32>,
    ) -> CadenceResult<WriteReceipt> {
        Ok(self.record(table, relation.len() as RowCount, estimated_rows, part_id))
    }
}

/// Builder that emits `days x rows_per_day` rows per table for each window.
#[derive(Debug, Clone)]
pub struct StubBuilder {
    tables: Vec<String>,
    rows_per_day: RowCount,
    fail_on_call: Option<usize>,
    pub windows: Vec<DateWindow>,
}

impl StubBuilder {
    pub fn new(tables: &[&str], rows_per_day: RowCount) -> Self {
        Self {
            tables: tables.iter().map(|t| t.to_string()).collect(),
            rows_per_day,
            fail_on_call: None,
            windows: Vec::new(),
        }
    }

    /// Fail the `n`th call (0-based).
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }
}

impl DatasetBuilder for StubBuilder {
    type Relation = RowCount;

    fn build_batch(&mut self, window: DateWindow) -> CadenceResult<BTreeMap<String, RowCount>> {
        if self.fail_on_call == Some(self.windows.len()) {
            return Err(BuildError::WindowFailed {
                start: window.start(),
                end: window.end(),
                reason: "scripted failure".to_string(),
            }
            .into());
        }
        self.windows.push(window);
        let rows = window.days() as RowCount * self.rows_per_day;
        Ok(self.tables.iter().map(|t| (t.clone(), rows)).collect())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Cadence value types.

    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use proptest::prelude::*;

    /// A date between 2000-01-01 and roughly 2040.
    pub fn arb_date() -> impl Strategy<Value = Date> {
        (0i64..14_600).prop_map(|offset| {
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default() + ChronoDuration::days(offset)
        })
    }

    /// A window of at most `max_days` days.
    pub fn arb_window(max_days: i64) -> impl Strategy<Value = DateWindow> {
        (arb_date(), 0..max_days.max(1)).prop_map(|(start, len)| {
            let end = start + ChronoDuration::days(len);
            DateWindow::new(start, end).unwrap_or(DateWindow::single(start))
        })
    }

    pub fn arb_weekly_weights() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.1f64..3.0, 7)
    }

    pub fn arb_monthly_weights() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.1f64..3.0, 12)
    }

    /// Any non-terminal status.
    pub fn arb_control_status() -> impl Strategy<Value = BudgetStatus> {
        prop_oneof![
            Just(BudgetStatus::Normal),
            Just(BudgetStatus::Observation),
            Just(BudgetStatus::BudgetWarning),
        ]
    }

    pub fn arb_status() -> impl Strategy<Value = BudgetStatus> {
        prop_oneof![
            Just(BudgetStatus::Normal),
            Just(BudgetStatus::Observation),
            Just(BudgetStatus::BudgetWarning),
            Just(BudgetStatus::BudgetAbort),
            Just(BudgetStatus::GlobalHardStop),
        ]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Readings and configurations for common scenarios.

    use super::*;
    use chrono::NaiveDate;

    pub const BASELINE_AVAILABLE_GB: f64 = 10.0;
    pub const BASELINE_RSS_GB: f64 = 1.0;
    pub const TOTAL_GB: f64 = 16.0;

    fn gb(value: f64) -> u64 {
        (value * BYTES_PER_GB) as u64
    }

    pub fn reading(available_gb: f64, rss_gb: f64, system_pct: f64) -> MemoryReading {
        MemoryReading {
            total_bytes: gb(TOTAL_GB),
            available_bytes: gb(available_gb),
            system_pct,
            process_rss_bytes: gb(rss_gb),
        }
    }

    /// 10 GB available, 1 GB resident, 40% system utilization.
    pub fn baseline() -> MemoryReading {
        reading(BASELINE_AVAILABLE_GB, BASELINE_RSS_GB, 40.0)
    }

    /// A reading that classifies as `status` against [`baseline`] under the
    /// default policy. The process growth is mirrored in available memory
    /// so drift stays at zero.
    pub fn reading_for(status: BudgetStatus) -> MemoryReading {
        let (growth_gb, system_pct) = match status {
            BudgetStatus::Normal => (0.0, 40.0),
            BudgetStatus::Observation => (6.5, 70.0),
            BudgetStatus::BudgetWarning => (8.5, 80.0),
            BudgetStatus::BudgetAbort => (9.5, 90.0),
            BudgetStatus::GlobalHardStop => (0.0, 96.0),
        };
        reading(
            BASELINE_AVAILABLE_GB - growth_gb,
            BASELINE_RSS_GB + growth_gb,
            system_pct,
        )
    }

    pub fn date(y: i32, m: u32, d: u32) -> Date {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    /// 2024-01-01..=2024-01-10 at 600k/day: 6M rows, above the batching threshold.
    pub fn batched_config() -> GenerationConfig {
        GenerationConfig::new(date(2024, 1, 1), date(2024, 1, 10), 600_000)
    }

    /// 2024-01-01..=2024-01-10 at 1k/day: a single pass.
    pub fn small_config() -> GenerationConfig {
        GenerationConfig::new(date(2024, 1, 1), date(2024, 1, 10), 1_000)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Cadence-specific invariants.

    use super::*;

    /// Assert that windows are contiguous and non-empty.
    #[track_caller]
    pub fn assert_contiguous(windows: &[DateWindow]) {
        for pair in windows.windows(2) {
            assert_eq!(
                pair[1].start(),
                pair[0].end() + chrono::Duration::days(1),
                "Gap or overlap between {} and {}",
                pair[0],
                pair[1]
            );
        }
    }

    /// Assert that a result is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &CadenceResult<T>) {
        match result {
            Err(CadenceError::Config(_)) | Err(CadenceError::Timeline(_)) => {}
            other => panic!("Expected configuration error, got: {:?}", other),
        }
    }

    /// Assert that a result is a Resource error.
    #[track_caller]
    pub fn assert_resource_error<T: std::fmt::Debug>(result: &CadenceResult<T>) {
        match result {
            Err(CadenceError::Resource(_)) => {}
            other => panic!("Expected Resource error, got: {:?}", other),
        }
    }
}
