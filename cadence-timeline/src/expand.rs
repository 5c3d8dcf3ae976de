//! Event skeletons: one date per event.
//!
//! A skeleton repeats each day's date `count` times, in plan order. It is
//! lazy, so only the current day and its remaining repeat count are held.

use crate::timeline::{DailyVolumePlan, DayVolume};
use cadence_core::{Date, RowCount};
use std::iter::FusedIterator;

/// Lazy per-event date sequence over a [`DailyVolumePlan`].
#[derive(Debug, Clone)]
pub struct EventSkeleton<'a> {
    days: std::slice::Iter<'a, DayVolume>,
    current: Option<Date>,
    left_in_day: RowCount,
    left_total: RowCount,
}

impl<'a> EventSkeleton<'a> {
    pub fn new(plan: &'a DailyVolumePlan) -> Self {
        Self {
            days: plan.iter(),
            current: None,
            left_in_day: 0,
            left_total: plan.total_events(),
        }
    }

    /// Events not yet yielded.
    pub fn remaining(&self) -> RowCount {
        self.left_total
    }
}

impl Iterator for EventSkeleton<'_> {
    type Item = Date;

    fn next(&mut self) -> Option<Date> {
        while self.left_in_day == 0 {
            let day = self.days.next()?;
            self.current = Some(day.date);
            self.left_in_day = day.count;
        }
        self.left_in_day -= 1;
        self.left_total -= 1;
        self.current
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.left_total) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl ExactSizeIterator for EventSkeleton<'_> {}

impl FusedIterator for EventSkeleton<'_> {}

/// Expand `plan` into its event skeleton.
pub fn expand_events(plan: &DailyVolumePlan) -> EventSkeleton<'_> {
    EventSkeleton::new(plan)
}

impl DailyVolumePlan {
    /// Shorthand for [`expand_events`].
    pub fn events(&self) -> EventSkeleton<'_> {
        EventSkeleton::new(self)
    }
}

// =============================================================================
// TESTS
// =============================================================================
