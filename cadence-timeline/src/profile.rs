//! Time profile: the composite volume multiplier for a calendar day.
//!
//! ```text
//! factor = monthly[month] x trend x weekly[weekday]
//!          x holiday(month, day) x special(date) x payday(day)
//! ```
//!
//! The result is floored at [`MIN_FACTOR`] so no day ever has zero or
//! negative expected volume.

use cadence_core::{CadenceResult, Date, TimelineError};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Floor applied to every composite factor.
pub const MIN_FACTOR: f64 = 0.1;

/// Average month length used to express the trend slope per month.
pub const DAYS_PER_MONTH: f64 = 30.44;

/// Multiplier for mid-month paydays (days 14-16).
pub const MID_MONTH_PAYDAY: f64 = 1.25;

/// Multiplier for end-of-month paydays (day 28 onward).
pub const MONTH_END_PAYDAY: f64 = 1.35;

/// Temporal behavior of a business domain. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeProfile {
    name: String,
    monthly_weights: [f64; 12],
    weekly_weights: [f64; 7],
    trend_slope: f64,
    holidays: HashMap<(u32, u32), f64>,
    special_dates: BTreeMap<Date, f64>,
    payday: bool,
}

impl TimeProfile {
    /// Create a profile with the given weekday weights (Monday first).
    ///
    /// Everything else starts neutral: flat months, no trend, no holidays,
    /// no special dates, payday effect off.
    pub fn new(name: impl Into<String>, weekly_weights: &[f64]) -> CadenceResult<Self> {
        let weekly: [f64; 7] = weekly_weights
            .try_into()
            .map_err(|_| TimelineError::WeeklyWeightsLength {
                got: weekly_weights.len(),
            })?;
        Ok(Self {
            name: name.into(),
            monthly_weights: [1.0; 12],
            weekly_weights: weekly,
            trend_slope: 0.0,
            holidays: HashMap::new(),
            special_dates: BTreeMap::new(),
            payday: false,
        })
    }

    /// A profile where every multiplier is 1.0.
    pub fn flat(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            monthly_weights: [1.0; 12],
            weekly_weights: [1.0; 7],
            trend_slope: 0.0,
            holidays: HashMap::new(),
            special_dates: BTreeMap::new(),
            payday: false,
        }
    }

    /// Set the monthly weights (January first).
    pub fn with_monthly_weights(mut self, weights: &[f64]) -> CadenceResult<Self> {
        self.monthly_weights = weights
            .try_into()
            .map_err(|_| TimelineError::MonthlyWeightsLength { got: weights.len() })?;
        Ok(self)
    }

    /// Linear growth per ~month. 0.01 = +1% per month.
    pub fn with_trend_slope(mut self, slope: f64) -> Self {
        self.trend_slope = slope;
        self
    }

    /// Recurring (month, day) multipliers.
    pub fn with_holidays(mut self, holidays: HashMap<(u32, u32), f64>) -> Self {
        self.holidays = holidays;
        self
    }

    /// Exact-date multipliers, typically expanded ramps and events.
    pub fn with_special_dates(mut self, special_dates: BTreeMap<Date, f64>) -> Self {
        self.special_dates = special_dates;
        self
    }

    pub fn with_payday(mut self, enabled: bool) -> Self {
        self.payday = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weekly_weights(&self) -> &[f64; 7] {
        &self.weekly_weights
    }

    pub fn monthly_weights(&self) -> &[f64; 12] {
        &self.monthly_weights
    }

    pub fn trend_slope(&self) -> f64 {
        self.trend_slope
    }

    pub fn payday_enabled(&self) -> bool {
        self.payday
    }

    pub fn special_dates(&self) -> &BTreeMap<Date, f64> {
        &self.special_dates
    }

    /// Composite multiplier for `date` in a run that started on `run_start`.
    pub fn factor(&self, date: Date, run_start: Date) -> f64 {
        let seasonal = self.monthly_weights[date.month0() as usize];
        let weekly = self.weekly_weights[date.weekday().num_days_from_monday() as usize];
        let holiday = self
            .holidays
            .get(&(date.month(), date.day()))
            .copied()
            .unwrap_or(1.0);
        let special = self.special_dates.get(&date).copied().unwrap_or(1.0);
        let payday = if self.payday {
            payday_multiplier(date.day())
        } else {
            1.0
        };

        let composite =
            seasonal * self.trend_factor(date, run_start) * weekly * holiday * special * payday;
        composite.max(MIN_FACTOR)
    }

    /// `1 + slope x (days since start / 30.44)`.
    pub fn trend_factor(&self, date: Date, run_start: Date) -> f64 {
        let days_elapsed = (date - run_start).num_days() as f64;
        1.0 + self.trend_slope * (days_elapsed / DAYS_PER_MONTH)
    }
}

/// Payday spike by day of month.
pub fn payday_multiplier(day_of_month: u32) -> f64 {
    match day_of_month {
        14..=16 => MID_MONTH_PAYDAY,
        day if day >= 28 => MONTH_END_PAYDAY,
        _ => 1.0,
    }
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
    fn test_weekly_weights_must_have_seven_entries() {
        assert!(TimeProfile::new("short", &[1.0; 6]).is_err());
        assert!(TimeProfile::new("long", &[1.0; 8]).is_err());
        assert!(TimeProfile::new("ok", &[1.0; 7]).is_ok());
    }

    #[test]
    fn test_monthly_weights_must_have_twelve_entries() {
        let profile = TimeProfile::flat("p");
        assert!(profile.clone().with_monthly_weights(&[1.0; 11]).is_err());
        assert!(profile.with_monthly_weights(&[1.0; 12]).is_ok());
    }

    #[test]
    fn test_flat_profile_is_one() {
        let profile = TimeProfile::flat("flat");
        let start = d(2024, 1, 1);
        assert_eq!(profile.factor(d(2024, 6, 5), start), 1.0);
    }

    #[test]
    fn test_weekday_weight_applied_monday_first() {
        let weights = [0.9, 0.9, 1.0, 1.05, 1.2, 1.3, 1.1];
        let profile = TimeProfile::new("retail", &weights).unwrap();
        let start = d(2024, 1, 1);
        // 2024-01-01 is a Monday, 2024-01-06 a Saturday.
        assert!((profile.factor(d(2024, 1, 1), start) - 0.9).abs() < 1e-12);
        assert!((profile.factor(d(2024, 1, 6), start) - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_trend_grows_per_month() {
        let profile = TimeProfile::flat("trend").with_trend_slope(0.01);
        let start = d(2024, 1, 1);
        assert_eq!(profile.trend_factor(start, start), 1.0);
        let later = start + chrono::Duration::days(61);
        let expected = 1.0 + 0.01 * (61.0 / DAYS_PER_MONTH);
        assert!((profile.trend_factor(later, start) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_holiday_and_special_date_compose() {
        let mut holidays = HashMap::new();
        holidays.insert((12, 24), 2.0);
        let mut special = BTreeMap::new();
        special.insert(d(2024, 12, 24), 1.5);
        let profile = TimeProfile::flat("x")
            .with_holidays(holidays)
            .with_special_dates(special);
        let start = d(2024, 1, 1);
        assert!((profile.factor(d(2024, 12, 24), start) - 3.0).abs() < 1e-12);
        assert!((profile.factor(d(2025, 12, 24), start) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_payday_multiplier_ranges() {
        assert_eq!(payday_multiplier(13), 1.0);
        assert_eq!(payday_multiplier(14), MID_MONTH_PAYDAY);
        assert_eq!(payday_multiplier(16), MID_MONTH_PAYDAY);
        assert_eq!(payday_multiplier(17), 1.0);
        assert_eq!(payday_multiplier(27), 1.0);
        assert_eq!(payday_multiplier(28), MONTH_END_PAYDAY);
        assert_eq!(payday_multiplier(31), MONTH_END_PAYDAY);
    }

    #[test]
    fn test_payday_toggle() {
        let start = d(2024, 1, 1);
        let off = TimeProfile::flat("off");
        let on = TimeProfile::flat("on").with_payday(true);
        assert_eq!(off.factor(d(2024, 1, 15), start), 1.0);
        assert_eq!(on.factor(d(2024, 1, 15), start), MID_MONTH_PAYDAY);
    }

    #[test]
    fn test_factor_floor() {
        let profile = TimeProfile::flat("shrinking").with_trend_slope(-1.0);
        let start = d(2024, 1, 1);
        assert_eq!(profile.factor(d(2024, 12, 1), start), MIN_FACTOR);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The composite factor never drops below the floor.
        #[test]
        fn prop_factor_never_below_floor(
            offset in 0i64..3650,
            slope in -0.5f64..0.5,
            weight in 0.0f64..3.0,
        ) {
            let profile = TimeProfile::new("p", &[weight; 7]).unwrap().with_trend_slope(slope);
            let start = d(2020, 1, 1);
            let date = start + chrono::Duration::days(offset);
            prop_assert!(profile.factor(date, start) >= MIN_FACTOR);
        }
    }
}
