//! Memory budget monitor.
//!
//! The monitor captures a baseline once per run and derives two signals from
//! every later reading:
//!
//! ```text
//! budget_usage_pct = (rss - rss0) / available0 x 100
//! drift_gb         = (available0 - available) - (rss - rss0)
//! ```
//!
//! Budget usage is the share of memory that was free at start and has since
//! been taken by this process. Drift is the change in pressure that this
//! process does not explain: positive when external load grew, negative when
//! other processes released memory.
//!
//! Classification is delegated to [`BudgetPolicy::classify`], which checks
//! host-wide utilization before budget usage.

use crate::probe::{MemoryProbe, MemoryReading};
use cadence_core::{bytes_to_gb, BudgetPolicy, BudgetStatus, CadenceResult, ResourceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

// ============================================================================
// PAUSING
// ============================================================================

/// Blocks the control loop while memory is reclaimed.
pub trait Pauser {
    fn pause(&mut self, duration: Duration);
}

impl<T: Pauser + ?Sized> Pauser for Box<T> {
    fn pause(&mut self, duration: Duration) {
        (**self).pause(duration);
    }
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPauser;

impl Pauser for ThreadPauser {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ============================================================================
// STATE
// ============================================================================

/// Baseline and peaks for one run. Baseline fields are written once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudgetState {
    pub baseline_process_rss_gb: f64,
    pub baseline_available_gb: f64,
    pub baseline_system_pct: f64,
    pub peak_process_rss_gb: f64,
    pub peak_system_pct: f64,
    pub initialized: bool,
}

/// Everything derived from a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetReading {
    pub status: BudgetStatus,
    pub system_pct: f64,
    pub process_rss_gb: f64,
    pub available_gb: f64,
    pub budget_usage_pct: f64,
    pub drift_gb: f64,
}

// ============================================================================
// MONITOR
// ============================================================================

/// Per-run memory monitor. Construct one per run and hand it to the
/// scheduler.
pub struct MemoryBudgetMonitor<P, S = ThreadPauser> {
    probe: P,
    pauser: S,
    policy: BudgetPolicy,
    state: ResourceBudgetState,
}

impl<P: MemoryProbe> MemoryBudgetMonitor<P, ThreadPauser> {
    pub fn new(probe: P, policy: BudgetPolicy) -> Self {
        Self {
            probe,
            pauser: ThreadPauser,
            policy,
            state: ResourceBudgetState::default(),
        }
    }
}

impl<P: MemoryProbe, S: Pauser> MemoryBudgetMonitor<P, S> {
    /// Replace the pauser used by [`relieve`](Self::relieve).
    pub fn with_pauser<T: Pauser>(self, pauser: T) -> MemoryBudgetMonitor<P, T> {
        MemoryBudgetMonitor {
            probe: self.probe,
            pauser,
            policy: self.policy,
            state: self.state,
        }
    }

    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    pub fn state(&self) -> &ResourceBudgetState {
        &self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    /// Capture the baseline. Fails if called twice on the same monitor.
    pub fn initialize(&mut self) -> CadenceResult<()> {
        if self.state.initialized {
            return Err(ResourceError::BudgetAlreadyInitialized.into());
        }
        let reading = self.probe.read();
        let rss_gb = bytes_to_gb(reading.process_rss_bytes);
        self.state = ResourceBudgetState {
            baseline_process_rss_gb: rss_gb,
            baseline_available_gb: bytes_to_gb(reading.available_bytes),
            baseline_system_pct: reading.system_pct,
            peak_process_rss_gb: rss_gb,
            peak_system_pct: reading.system_pct,
            initialized: true,
        };
        info!(
            baseline_available_gb = self.state.baseline_available_gb,
            baseline_rss_gb = rss_gb,
            system_pct = reading.system_pct,
            "Memory budget baseline captured"
        );
        Ok(())
    }

    fn sample(&mut self) -> MemoryReading {
        let reading = self.probe.read();
        let rss_gb = bytes_to_gb(reading.process_rss_bytes);
        if rss_gb > self.state.peak_process_rss_gb {
            self.state.peak_process_rss_gb = rss_gb;
        }
        if reading.system_pct > self.state.peak_system_pct {
            self.state.peak_system_pct = reading.system_pct;
        }
        reading
    }

    /// Current host-wide utilization, 0-100.
    pub fn sample_system_pct(&mut self) -> f64 {
        self.sample().system_pct
    }

    /// Current resident memory of this process, in GB.
    pub fn sample_process_rss_gb(&mut self) -> f64 {
        bytes_to_gb(self.sample().process_rss_bytes)
    }

    /// Share of the starting free memory consumed by this process since the
    /// baseline. 0.0 before [`initialize`](Self::initialize).
    pub fn budget_usage_pct(&mut self) -> f64 {
        let reading = self.sample();
        self.usage_of(&reading)
    }

    /// Pressure change not caused by this process, in GB. 0.0 before
    /// [`initialize`](Self::initialize).
    pub fn drift_gb(&mut self) -> f64 {
        let reading = self.sample();
        self.drift_of(&reading)
    }

    pub fn classify(&mut self) -> BudgetStatus {
        self.assess().status
    }

    /// Sample once and derive every signal from that reading.
    pub fn assess(&mut self) -> BudgetReading {
        let reading = self.sample();
        let budget_usage_pct = self.usage_of(&reading);
        let status = self.policy.classify(reading.system_pct, budget_usage_pct);
        let assessed = BudgetReading {
            status,
            system_pct: reading.system_pct,
            process_rss_gb: bytes_to_gb(reading.process_rss_bytes),
            available_gb: bytes_to_gb(reading.available_bytes),
            budget_usage_pct,
            drift_gb: self.drift_of(&reading),
        };
        debug!(
            status = %assessed.status,
            system_pct = assessed.system_pct,
            budget_pct = assessed.budget_usage_pct,
            drift_gb = assessed.drift_gb,
            "Memory assessed"
        );
        assessed
    }

    /// Pause for `wait` when budget usage is above `threshold_pct`.
    ///
    /// Returns true when a pause happened. There is no collector to invoke;
    /// the pause gives the allocator and the OS time to return freed pages.
    pub fn relieve(&mut self, threshold_pct: f64, wait: Duration) -> bool {
        let usage = self.budget_usage_pct();
        if usage <= threshold_pct {
            return false;
        }
        info!(
            budget_pct = usage,
            threshold_pct,
            wait_secs = wait.as_secs_f64(),
            "Pausing to reclaim memory"
        );
        self.pauser.pause(wait);
        true
    }

    fn usage_of(&self, reading: &MemoryReading) -> f64 {
        if !self.state.initialized || self.state.baseline_available_gb <= 0.0 {
            return 0.0;
        }
        let growth = bytes_to_gb(reading.process_rss_bytes) - self.state.baseline_process_rss_gb;
        growth / self.state.baseline_available_gb * 100.0
    }

    fn drift_of(&self, reading: &MemoryReading) -> f64 {
        if !self.state.initialized {
            return 0.0;
        }
        let available_drop = self.state.baseline_available_gb - bytes_to_gb(reading.available_bytes);
        let own_growth = bytes_to_gb(reading.process_rss_bytes) - self.state.baseline_process_rss_gb;
        available_drop - own_growth
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{CadenceError, BYTES_PER_GB};
    use proptest::prelude::*;
    use std::collections::VecDeque;

    /// Replays readings in order, repeating the last one.
    struct Replay {
        readings: VecDeque<MemoryReading>,
        last: MemoryReading,
    }

    impl Replay {
        fn new(readings: Vec<MemoryReading>) -> Self {
            let last = readings[0];
            Self {
                readings: readings.into(),
                last,
            }
        }
    }

    impl MemoryProbe for Replay {
        fn read(&mut self) -> MemoryReading {
            if let Some(next) = self.readings.pop_front() {
                self.last = next;
            }
            self.last
        }
    }

    #[derive(Default)]
    struct CountingPauser {
        pauses: Vec<Duration>,
    }

    impl Pauser for CountingPauser {
        fn pause(&mut self, duration: Duration) {
            self.pauses.push(duration);
        }
    }

    fn gb(value: f64) -> u64 {
        (value * BYTES_PER_GB) as u64
    }

    fn reading(available_gb: f64, rss_gb: f64, system_pct: f64) -> MemoryReading {
        MemoryReading {
            total_bytes: gb(16.0),
            available_bytes: gb(available_gb),
            system_pct,
            process_rss_bytes: gb(rss_gb),
        }
    }

    fn monitor(readings: Vec<MemoryReading>) -> MemoryBudgetMonitor<Replay, CountingPauser> {
        MemoryBudgetMonitor::new(Replay::new(readings), BudgetPolicy::default())
            .with_pauser(CountingPauser::default())
    }

    #[test]
    fn test_signals_are_zero_before_initialize() {
        let mut m = monitor(vec![reading(10.0, 1.0, 40.0), reading(2.0, 9.0, 40.0)]);
        assert_eq!(m.budget_usage_pct(), 0.0);
        assert_eq!(m.drift_gb(), 0.0);
        assert!(!m.is_initialized());
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let mut m = monitor(vec![reading(10.0, 1.0, 40.0)]);
        m.initialize().unwrap();
        let err = m.initialize().unwrap_err();
        assert!(matches!(
            err,
            CadenceError::Resource(ResourceError::BudgetAlreadyInitialized)
        ));
    }

    #[test]
    fn test_drift_is_zero_when_process_explains_drop() {
        let mut m = monitor(vec![reading(10.0, 1.0, 40.0), reading(9.0, 2.0, 45.0)]);
        m.initialize().unwrap();
        assert!(m.drift_gb().abs() < 1e-9);
    }

    #[test]
    fn test_drift_sign() {
        // External load took 2 GB while we grew by 1 GB.
        let mut grew = monitor(vec![reading(10.0, 1.0, 40.0), reading(7.0, 2.0, 60.0)]);
        grew.initialize().unwrap();
        assert!((grew.drift_gb() - 2.0).abs() < 1e-9);

        // Someone else freed 3 GB.
        let mut freed = monitor(vec![reading(10.0, 1.0, 40.0), reading(13.0, 1.0, 30.0)]);
        freed.initialize().unwrap();
        assert!((freed.drift_gb() + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_budget_usage_pct() {
        let mut m = monitor(vec![reading(10.0, 1.0, 40.0), reading(4.0, 7.5, 70.0)]);
        m.initialize().unwrap();
        assert!((m.budget_usage_pct() - 65.0).abs() < 1e-9);
    }

    #[test]
    fn test_assess_classifies_from_one_reading() {
        let mut m = monitor(vec![
            reading(10.0, 1.0, 40.0),
            reading(10.0, 1.0, 50.0),
            reading(10.0, 7.5, 50.0),
            reading(10.0, 9.5, 50.0),
            reading(10.0, 10.5, 50.0),
            reading(10.0, 1.0, 96.0),
        ]);
        m.initialize().unwrap();
        assert_eq!(m.assess().status, BudgetStatus::Normal);
        assert_eq!(m.assess().status, BudgetStatus::Observation);
        assert_eq!(m.assess().status, BudgetStatus::BudgetWarning);
        assert_eq!(m.classify(), BudgetStatus::BudgetAbort);
        let hard = m.assess();
        assert_eq!(hard.status, BudgetStatus::GlobalHardStop);
        assert_eq!(hard.system_pct, 96.0);
    }

    #[test]
    fn test_peaks_track_maximum() {
        let mut m = monitor(vec![
            reading(10.0, 1.0, 40.0),
            reading(9.0, 3.0, 70.0),
            reading(9.5, 2.0, 50.0),
        ]);
        m.initialize().unwrap();
        m.sample_system_pct();
        m.sample_process_rss_gb();
        let state = m.state();
        assert!((state.peak_process_rss_gb - 3.0).abs() < 1e-9);
        assert_eq!(state.peak_system_pct, 70.0);
        assert!((state.baseline_available_gb - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_relieve_pauses_only_above_threshold() {
        let mut m = monitor(vec![
            reading(10.0, 1.0, 40.0),
            reading(10.0, 5.0, 40.0),
            reading(10.0, 9.5, 40.0),
        ]);
        m.initialize().unwrap();
        assert!(!m.relieve(80.0, Duration::from_secs(5)));
        assert!(m.relieve(80.0, Duration::from_secs(5)));
        assert_eq!(m.pauser.pauses, vec![Duration::from_secs(5)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Budget usage plus drift accounts for the whole change in available memory.
        #[test]
        fn prop_usage_and_drift_partition_available_drop(
            avail0 in 1.0f64..64.0,
            rss0 in 0.1f64..4.0,
            growth in 0.0f64..8.0,
            external in -4.0f64..4.0,
        ) {
            let avail = (avail0 - growth - external).max(0.0);
            let mut m = monitor(vec![reading(avail0, rss0, 30.0), reading(avail, rss0 + growth, 30.0)]);
            m.initialize().unwrap();
            let a = m.assess();
            let own_gb = a.budget_usage_pct / 100.0 * m.state().baseline_available_gb;
            let total_drop = m.state().baseline_available_gb - a.available_gb;
            prop_assert!((own_gb + a.drift_gb - total_drop).abs() < 1e-6);
        }
    }
}
