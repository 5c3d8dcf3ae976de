//! Batch window planning.
//!
//! A window covers `max(1, target_rows / max(1, daily_average))` days starting
//! at the cursor, clipped to the hard end. It is never empty, so every step
//! of the scheduler advances the cursor.

use cadence_core::{Date, DateWindow, RowCount};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// One contiguous window and the row target it was sized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub window: DateWindow,
    pub target_rows: RowCount,
}

impl BatchPlan {
    pub fn start(&self) -> Date {
        self.window.start()
    }

    pub fn end(&self) -> Date {
        self.window.end()
    }

    /// First day after this window.
    pub fn next_cursor(&self) -> Date {
        self.window.end() + Duration::days(1)
    }
}

/// Days per window for a given daily average and target.
pub fn days_per_batch(daily_average: RowCount, target_rows: RowCount) -> i64 {
    let days = target_rows / daily_average.max(1);
    days.clamp(1, i64::MAX as u64) as i64
}

/// Plan the window starting at `cursor`. `None` once `cursor` is past
/// `hard_end`.
pub fn next_window(
    cursor: Date,
    hard_end: Date,
    daily_average: RowCount,
    target_rows: RowCount,
) -> Option<BatchPlan> {
    if cursor > hard_end {
        return None;
    }
    let span = days_per_batch(daily_average, target_rows);
    let end = Duration::try_days(span - 1)
        .and_then(|delta| cursor.checked_add_signed(delta))
        .map_or(hard_end, |candidate| candidate.min(hard_end));
    Some(BatchPlan {
        window: DateWindow::new(cursor, end).ok()?,
        target_rows,
    })
}

/// Partition `range` into consecutive windows of a fixed size.
pub fn split_date_range(
    range: DateWindow,
    daily_average: RowCount,
    target_rows: RowCount,
) -> Vec<DateWindow> {
    let mut windows = Vec::new();
    let mut cursor = range.start();
    while let Some(plan) = next_window(cursor, range.end(), daily_average, target_rows) {
        windows.push(plan.window);
        cursor = plan.next_cursor();
    }
    windows
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_five_day_window() {
        let plan = next_window(d(2024, 1, 1), d(2024, 12, 31), 1_000_000, 5_000_000).unwrap();
        assert_eq!(plan.window.days(), 5);
        assert_eq!(plan.end(), d(2024, 1, 5));
        assert_eq!(plan.next_cursor(), d(2024, 1, 6));
    }

    #[test]
    fn test_window_clipped_to_hard_end() {
        let plan = next_window(d(2024, 1, 9), d(2024, 1, 10), 600_000, 5_000_000).unwrap();
        assert_eq!(plan.window.days(), 2);
        assert_eq!(plan.end(), d(2024, 1, 10));
    }

    #[test]
    fn test_tiny_target_still_one_day() {
        let plan = next_window(d(2024, 1, 1), d(2024, 1, 10), 1_000_000, 10).unwrap();
        assert_eq!(plan.window.days(), 1);
        let zero_avg = next_window(d(2024, 1, 1), d(2024, 1, 10), 0, 0).unwrap();
        assert_eq!(zero_avg.window.days(), 1);
    }

    #[test]
    fn test_cursor_past_end() {
        assert!(next_window(d(2024, 1, 11), d(2024, 1, 10), 1, 1).is_none());
    }

    #[test]
    fn test_split_six_million_rows() {
        let range = DateWindow::new(d(2024, 1, 1), d(2024, 1, 10)).unwrap();
        let windows = split_date_range(range, 600_000, 5_000_000);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], DateWindow::new(d(2024, 1, 1), d(2024, 1, 8)).unwrap());
        assert_eq!(windows[1], DateWindow::new(d(2024, 1, 9), d(2024, 1, 10)).unwrap());
    }

    #[test]
    fn test_huge_target_does_not_overflow() {
        let plan = next_window(d(2024, 1, 1), d(2024, 1, 10), 1, u64::MAX).unwrap();
        assert_eq!(plan.end(), d(2024, 1, 10));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Windows tile the range exactly: contiguous, non-empty, inside bounds.
        #[test]
        fn prop_split_tiles_range(
            len in 0i64..400,
            daily in 0u64..2_000_000,
            target in 0u64..10_000_000,
        ) {
            let start = d(2023, 6, 1);
            let range = DateWindow::new(start, start + Duration::days(len)).unwrap();
            let windows = split_date_range(range, daily, target);
            prop_assert_eq!(windows.first().map(|w| w.start()), Some(range.start()));
            prop_assert_eq!(windows.last().map(|w| w.end()), Some(range.end()));
            for pair in windows.windows(2) {
                prop_assert_eq!(pair[1].start(), pair[0].end() + Duration::days(1));
            }
            let covered: i64 = windows.iter().map(|w| w.days()).sum();
            prop_assert_eq!(covered, range.days());
        }
    }
}
