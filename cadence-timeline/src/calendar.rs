//! Calendar rules: recurring holidays, anchored ramps and flat events.
//!
//! Rules are year-agnostic. They are expanded into exact dates for every
//! year a run touches and folded into a special-date map. Overlapping rules
//! keep the highest multiplier for a date; they never add up.

use crate::profile::TimeProfile;
use cadence_core::{
    CadenceResult, Date, DateAnchor, DateWindow, FlatEvent, HolidayRule, ProfileConfig,
    ProfilePreset, RampRule, TimelineError,
};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// SPECIAL DATES
// ============================================================================

/// Exact-date multipliers with max-merge semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecialDates {
    factors: BTreeMap<Date, f64>,
}

impl SpecialDates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `date` to `factor` unless a higher factor is already present.
    pub fn merge_max(&mut self, date: Date, factor: f64) {
        let slot = self.factors.entry(date).or_insert(factor);
        if factor > *slot {
            *slot = factor;
        }
    }

    /// Linear ramp over the `days_before + 1` days ending on `target`.
    pub fn add_ramp(&mut self, target: Date, days_before: u32, start_factor: f64, peak_factor: f64) {
        if days_before == 0 {
            self.merge_max(target, peak_factor);
            return;
        }
        let slope = (peak_factor - start_factor) / days_before as f64;
        for i in 0..=days_before {
            let day = target - Duration::days((days_before - i) as i64);
            self.merge_max(day, start_factor + slope * i as f64);
        }
    }

    /// Same factor on every day of `window`.
    pub fn add_flat(&mut self, window: DateWindow, factor: f64) {
        for day in window.iter_days() {
            self.merge_max(day, factor);
        }
    }

    pub fn get(&self, date: Date) -> Option<f64> {
        self.factors.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<Date, f64> {
        self.factors
    }
}

// ============================================================================
// DATE ANCHORS
// ============================================================================

/// The `nth` (1-based) occurrence of `weekday` in `month` of `year`.
///
/// Returns `None` when the month has fewer occurrences.
pub fn nth_weekday(year: i32, month: u32, weekday: Weekday, nth: u32) -> Option<Date> {
    if nth == 0 {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let shift = (7 + weekday.num_days_from_monday() as i64
        - first.weekday().num_days_from_monday() as i64)
        % 7;
    let day = first + Duration::days(shift + 7 * (nth as i64 - 1));
    (day.month() == month).then_some(day)
}

/// Weekday from a Monday-based index (0 = Monday, 6 = Sunday).
pub fn weekday_from_monday(index: u32) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Resolve an anchor to a concrete date in `year`.
///
/// Fixed anchors that do not exist in `year` (Feb 29 on a common year)
/// resolve to `None` and are skipped.
pub fn resolve_anchor(anchor: &DateAnchor, year: i32) -> Option<Date> {
    match anchor {
        DateAnchor::Fixed { month, day } => NaiveDate::from_ymd_opt(year, *month, *day),
        DateAnchor::NthWeekday {
            month,
            weekday,
            nth,
        } => {
            nth_weekday(year, *month, weekday_from_monday(*weekday)?, *nth)
        }
    }
}

// ============================================================================
// RULE EXPANSION
// ============================================================================

/// Expand ramps and flat events for every year that can affect `window`.
///
/// The year after the window is included so ramps anchored early in that
/// year still contribute their lead-in days.
pub fn expand_special_dates(
    ramps: &[RampRule],
    events: &[FlatEvent],
    window: DateWindow,
) -> SpecialDates {
    let mut special = SpecialDates::new();
    let first_year = window.start().year();
    let last_year = window.end().year() + 1;

    for year in first_year..=last_year {
        for ramp in ramps {
            if let Some(target) = resolve_anchor(&ramp.anchor, year) {
                special.add_ramp(target, ramp.days_before, ramp.start_factor, ramp.peak_factor);
            }
        }
        for event in events {
            let first = NaiveDate::from_ymd_opt(year, event.month, event.first_day);
            let last = NaiveDate::from_ymd_opt(year, event.month, event.last_day);
            if let (Some(first), Some(last)) = (first, last) {
                if let Ok(span) = DateWindow::new(first, last) {
                    special.add_flat(span, event.factor);
                }
            }
        }
    }

    special
}

/// Recurring holidays keyed by (month, day). Later duplicates win.
pub fn holiday_table(holidays: &[HolidayRule]) -> HashMap<(u32, u32), f64> {
    holidays
        .iter()
        .map(|h| ((h.month, h.day), h.factor))
        .collect()
}

// ============================================================================
// PRESETS
// ============================================================================

/// Weekday weights for retail: quiet early week, weekend peak.
pub const RETAIL_WEEKLY_WEIGHTS: [f64; 7] = [0.9, 0.9, 1.0, 1.05, 1.2, 1.3, 1.1];

/// Trend slope for retail, about +0.5% per month.
pub const RETAIL_TREND_SLOPE: f64 = 0.005;

/// Retail holiday table.
pub fn retail_holidays() -> Vec<HolidayRule> {
    [
        (1, 1, 0.5),
        (2, 14, 1.4),
        (5, 1, 1.1),
        (7, 28, 1.8),
        (7, 29, 1.8),
        (10, 31, 1.3),
        (12, 25, 0.2),
        (12, 31, 1.5),
    ]
    .into_iter()
    .map(|(month, day, factor)| HolidayRule { month, day, factor })
    .collect()
}

/// Retail ramps: Mother's Day, national holidays, Christmas Eve.
pub fn retail_ramps() -> Vec<RampRule> {
    vec![
        // Second Sunday of May
        RampRule {
            anchor: DateAnchor::NthWeekday {
                month: 5,
                weekday: 6,
                nth: 2,
            },
            days_before: 7,
            start_factor: 1.1,
            peak_factor: 3.0,
        },
        // Mid-July bonus season into July 28
        RampRule {
            anchor: DateAnchor::Fixed { month: 7, day: 28 },
            days_before: 13,
            start_factor: 1.2,
            peak_factor: 2.5,
        },
        // November 20 through Christmas Eve
        RampRule {
            anchor: DateAnchor::Fixed { month: 12, day: 24 },
            days_before: 34,
            start_factor: 1.1,
            peak_factor: 3.5,
        },
    ]
}

/// Retail flat events: the second national holiday and two online sale
/// weekends.
pub fn retail_events() -> Vec<FlatEvent> {
    vec![
        FlatEvent {
            month: 7,
            first_day: 29,
            last_day: 29,
            factor: 2.5,
        },
        FlatEvent {
            month: 7,
            first_day: 15,
            last_day: 17,
            factor: 1.8,
        },
        FlatEvent {
            month: 11,
            first_day: 14,
            last_day: 16,
            factor: 1.8,
        },
    ]
}

/// Build a [`TimeProfile`] for `window` from configuration.
///
/// The preset provides the baseline; explicit fields replace it and rule
/// lists extend it.
pub fn build_profile(config: &ProfileConfig, window: DateWindow) -> CadenceResult<TimeProfile> {
    let preset = config.preset.unwrap_or(ProfilePreset::Flat);

    let (weekly, slope, payday, mut holidays, mut ramps, mut events) = match preset {
        ProfilePreset::Flat => ([1.0; 7].to_vec(), 0.0, false, Vec::new(), Vec::new(), Vec::new()),
        ProfilePreset::Retail => (
            RETAIL_WEEKLY_WEIGHTS.to_vec(),
            RETAIL_TREND_SLOPE,
            true,
            retail_holidays(),
            retail_ramps(),
            retail_events(),
        ),
    };

    holidays.extend(config.holidays.iter().cloned());
    ramps.extend(config.ramps.iter().cloned());
    events.extend(config.events.iter().cloned());

    for ramp in &ramps {
        if ramp.days_before == 0 {
            return Err(TimelineError::InvalidRule {
                rule: format!("{:?}", ramp.anchor),
                reason: "ramp needs at least one lead-in day".to_string(),
            }
            .into());
        }
    }

    let weekly = config.weekly_weights.clone().unwrap_or(weekly);
    let mut profile = TimeProfile::new(config.name.clone(), &weekly)?
        .with_trend_slope(config.trend_slope.unwrap_or(slope))
        .with_payday(config.payday.unwrap_or(payday))
        .with_holidays(holiday_table(&holidays))
        .with_special_dates(expand_special_dates(&ramps, &events, window).into_map());

    if let Some(monthly) = &config.monthly_weights {
        profile = profile.with_monthly_weights(monthly)?;
    }

    Ok(profile)
}

// =============================================================================
// TESTS
// =============================================================================
