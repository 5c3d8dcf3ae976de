//! Daily volume plans.
//!
//! ```text
//! for day in [start, end]:
//!     composite = profile.factor(day, start)
//!     macro     = macro_year_factor(day.year)
//!     jitter    = U[0.8, 1.2)
//!     lambda    = daily_average x composite x macro x jitter
//!     count     = Poisson(lambda)        if lambda < 30
//!               | round(N(lambda, sqrt(lambda))) floored at 0
//! ```
//!
//! Days are visited in ascending order so a seeded run replays exactly.

use crate::profile::TimeProfile;
use crate::sampling::{jitter, macro_year_factor, sample_count};
use cadence_core::{Date, DateWindow, RowCount};
use chrono::{Datelike, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One day of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayVolume {
    pub date: Date,
    pub composite_factor: f64,
    pub macro_factor: f64,
    pub jitter: f64,
    pub expected_volume: f64,
    pub count: RowCount,
    pub weekday: Weekday,
}

/// Exactly one [`DayVolume`] per calendar day of `window`, ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVolumePlan {
    window: DateWindow,
    days: Vec<DayVolume>,
}

impl DailyVolumePlan {
    pub fn window(&self) -> DateWindow {
        self.window
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> &[DayVolume] {
        &self.days
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DayVolume> {
        self.days.iter()
    }

    /// Sum of sampled counts.
    pub fn total_events(&self) -> RowCount {
        self.days.iter().map(|d| d.count).sum()
    }

    /// Count for `date`, or `None` outside the window.
    pub fn count_on(&self, date: Date) -> Option<RowCount> {
        if !self.window.contains(date) {
            return None;
        }
        let offset = (date - self.window.start()).num_days() as usize;
        self.days.get(offset).map(|d| d.count)
    }
}

impl<'a> IntoIterator for &'a DailyVolumePlan {
    type Item = &'a DayVolume;
    type IntoIter = std::slice::Iter<'a, DayVolume>;

    fn into_iter(self) -> Self::IntoIter {
        self.days.iter()
    }
}

/// Turns a window, a daily average and a profile into a [`DailyVolumePlan`].
#[derive(Debug, Clone)]
pub struct TimelineGenerator {
    window: DateWindow,
    run_start: Date,
    daily_average: f64,
    profile: TimeProfile,
}

impl TimelineGenerator {
    pub fn new(window: DateWindow, daily_average: f64, profile: TimeProfile) -> Self {
        Self {
            window,
            run_start: window.start(),
            daily_average,
            profile,
        }
    }

    /// Anchor the trend at `run_start` instead of the window start.
    ///
    /// Batched runs generate one window at a time but keep the trend of the
    /// full range.
    pub fn with_run_start(mut self, run_start: Date) -> Self {
        self.run_start = run_start;
        self
    }

    pub fn profile(&self) -> &TimeProfile {
        &self.profile
    }

    /// Sample one plan from `rng`.
    ///
    /// A non-positive daily average yields a plan of zeros; the random
    /// source is still advanced once per day for jitter.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> DailyVolumePlan {
        let run_start = self.run_start;
        let base = self.daily_average.max(0.0);
        let mut macro_cache: HashMap<i32, f64> = HashMap::new();

        let days = self
            .window
            .iter_days()
            .map(|date| {
                let composite = self.profile.factor(date, run_start);
                let macro_factor = *macro_cache
                    .entry(date.year())
                    .or_insert_with(|| macro_year_factor(date.year()));
                let jitter = jitter(rng);
                let expected = base * composite * macro_factor * jitter;
                DayVolume {
                    date,
                    composite_factor: composite,
                    macro_factor,
                    jitter,
                    expected_volume: expected,
                    count: sample_count(rng, expected),
                    weekday: date.weekday(),
                }
            })
            .collect();

        DailyVolumePlan {
            window: self.window,
            days,
        }
    }

    /// Sample one plan from a fresh generator seeded with `seed`.
    pub fn generate_seeded(&self, seed: u64) -> DailyVolumePlan {
        let mut rng = StdRng::seed_from_u64(seed);
        self.generate(&mut rng)
    }
}

// =============================================================================
// TESTS
// =============================================================================
