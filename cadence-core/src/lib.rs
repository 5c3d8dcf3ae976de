//! Cadence Core - Shared Value Types
//!
//! Plain data shared by every other crate: calendar windows, budget status
//! classification, the error hierarchy and configuration. Rows are never
//! materialized here; the core only trades in dates, counts and windows.

pub mod config;
pub mod error;

pub use config::*;
pub use error::*;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// SCALAR TYPES
// ============================================================================

/// Calendar date without a time zone. Every window boundary is a whole day.
pub type Date = NaiveDate;

/// Row counts are unsigned; a day can legitimately produce zero rows.
pub type RowCount = u64;

/// Bytes in one gibibyte. All memory figures are reported in these units.
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Convert a byte count to GB.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// Number of calendar days in `[start, end]`, inclusive.
/// Returns 0 when `end` precedes `start`.
pub fn days_inclusive(start: Date, end: Date) -> i64 {
    let days = (end - start).num_days() + 1;
    days.max(0)
}

// ============================================================================
// DATE WINDOW
// ============================================================================

/// A contiguous, inclusive calendar range.
///
/// Construction guarantees `start <= end`, so a window always covers at
/// least one day. Deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct DateWindow {
    start: Date,
    end: Date,
}

#[derive(Deserialize)]
struct RawWindow {
    start: Date,
    end: Date,
}

impl TryFrom<RawWindow> for DateWindow {
    type Error = CadenceError;

    fn try_from(raw: RawWindow) -> CadenceResult<Self> {
        DateWindow::new(raw.start, raw.end)
    }
}

impl DateWindow {
    /// Create a window, rejecting `end < start`.
    pub fn new(start: Date, end: Date) -> CadenceResult<Self> {
        if end < start {
            return Err(TimelineError::InvalidRange { start, end }.into());
        }
        Ok(Self { start, end })
    }

    /// Single-day window.
    pub fn single(day: Date) -> Self {
        Self { start: day, end: day }
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    /// Number of days covered (always >= 1).
    pub fn days(&self) -> i64 {
        days_inclusive(self.start, self.end)
    }

    pub fn contains(&self, day: Date) -> bool {
        day >= self.start && day <= self.end
    }

    /// Iterate every day of the window in ascending order.
    pub fn iter_days(&self) -> impl Iterator<Item = Date> {
        let start = self.start;
        (0..self.days()).map(move |offset| start + Duration::days(offset))
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.start, self.end)
    }
}

// ============================================================================
// BUDGET STATUS
// ============================================================================

/// Discrete memory classification, ordered from calm to critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    /// Budget usage below the observation threshold
    Normal,
    /// Budget usage elevated; batch size is frozen
    Observation,
    /// Budget usage high; batch size shrinks and the loop pauses to reclaim
    BudgetWarning,
    /// This process consumed too much of its budget; stop
    BudgetAbort,
    /// The host as a whole is near exhaustion; stop regardless of cause
    GlobalHardStop,
}

impl BudgetStatus {
    /// Terminal statuses stop the scheduler.
    pub fn is_abort(&self) -> bool {
        matches!(self, BudgetStatus::BudgetAbort | BudgetStatus::GlobalHardStop)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Normal => "NORMAL",
            BudgetStatus::Observation => "OBSERVATION",
            BudgetStatus::BudgetWarning => "BUDGET_WARNING",
            BudgetStatus::BudgetAbort => "BUDGET_ABORT",
            BudgetStatus::GlobalHardStop => "GLOBAL_HARD_STOP",
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        let result = DateWindow::new(d(2024, 1, 10), d(2024, 1, 1));
        assert!(matches!(
            result,
            Err(CadenceError::Timeline(TimelineError::InvalidRange { .. }))
        ));
    }

    #[test]
    fn test_window_days_and_iteration() {
        let window = DateWindow::new(d(2024, 2, 27), d(2024, 3, 2)).unwrap();
        assert_eq!(window.days(), 5);
        let days: Vec<Date> = window.iter_days().collect();
        assert_eq!(days.first(), Some(&d(2024, 2, 27)));
        assert_eq!(days[2], d(2024, 2, 29));
        assert_eq!(days.last(), Some(&d(2024, 3, 2)));
    }

    #[test]
    fn test_window_deserialize_checks_order() {
        let window: DateWindow = toml::from_str("start = \"2024-01-01\"\nend = \"2024-01-10\"\n").unwrap();
        assert_eq!(window, DateWindow::new(d(2024, 1, 1), d(2024, 1, 10)).unwrap());

        let inverted = toml::from_str::<DateWindow>("start = \"2024-01-10\"\nend = \"2024-01-01\"\n");
        let err = inverted.unwrap_err();
        assert!(err.to_string().contains("cannot be before"));
    }

    #[test]
    fn test_budget_status_display_and_order() {
        assert_eq!(BudgetStatus::GlobalHardStop.to_string(), "GLOBAL_HARD_STOP");
        assert!(BudgetStatus::BudgetWarning > BudgetStatus::Observation);
        assert!(BudgetStatus::BudgetAbort.is_abort());
        assert!(!BudgetStatus::BudgetWarning.is_abort());
    }

    #[test]
    fn test_bytes_to_gb() {
        assert!((bytes_to_gb(2 * 1024 * 1024 * 1024) - 2.0).abs() < f64::EPSILON);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// days_inclusive agrees with the number of iterated days.
        #[test]
        fn prop_window_iteration_matches_day_count(offset in 0i64..2000, len in 0i64..400) {
            let start = d(2020, 1, 1) + Duration::days(offset);
            let end = start + Duration::days(len);
            let window = DateWindow::new(start, end).unwrap();
            prop_assert_eq!(window.iter_days().count() as i64, len + 1);
            prop_assert_eq!(window.days(), len + 1);
        }
    }
}
