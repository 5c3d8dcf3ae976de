//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration as StdDuration;

// ============================================================================
// CALENDAR RULES
// ============================================================================

/// Built-in profile presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfilePreset {
    /// Every multiplier is 1.0
    Flat,
    /// Retail calendar: weekend peaks, gift holidays, payday spikes
    Retail,
}

/// A multiplier applied to the same (month, day) every year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HolidayRule {
    pub month: u32,
    pub day: u32,
    pub factor: f64,
}

/// Where a ramp peaks within a given year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum DateAnchor {
    /// A fixed calendar day, e.g. December 24
    Fixed { month: u32, day: u32 },
    /// The nth weekday of a month. `weekday` counts from Monday = 0.
    NthWeekday { month: u32, weekday: u32, nth: u32 },
}

/// Linear ramp from `start_factor` to `peak_factor` over the `days_before`
/// days leading up to (and including) the anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RampRule {
    pub anchor: DateAnchor,
    pub days_before: u32,
    pub start_factor: f64,
    pub peak_factor: f64,
}

/// Constant multiplier over `first_day..=last_day` of a month, every year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlatEvent {
    pub month: u32,
    pub first_day: u32,
    pub last_day: u32,
    pub factor: f64,
}

/// Parameters for building a time profile.
///
/// A preset supplies the baseline; explicit fields replace the preset's
/// values, and rule lists extend the preset's rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProfileConfig {
    pub name: String,
    pub preset: Option<ProfilePreset>,
    pub monthly_weights: Option<Vec<f64>>,
    pub weekly_weights: Option<Vec<f64>>,
    pub trend_slope: Option<f64>,
    pub payday: Option<bool>,
    pub holidays: Vec<HolidayRule>,
    pub ramps: Vec<RampRule>,
    pub events: Vec<FlatEvent>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            preset: None,
            monthly_weights: None,
            weekly_weights: None,
            trend_slope: None,
            payday: None,
            holidays: Vec::new(),
            ramps: Vec::new(),
            events: Vec::new(),
        }
    }
}

// ============================================================================
// POLICIES
// ============================================================================

/// Memory classification thresholds, in percent.
///
/// `hard_stop_system_pct` applies to host-wide utilization; the rest apply
/// to this process's budget usage. Boundaries are inclusive-lower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BudgetPolicy {
    pub observation_pct: f64,
    pub warning_pct: f64,
    pub abort_pct: f64,
    pub hard_stop_system_pct: f64,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            observation_pct: 60.0,
            warning_pct: 80.0,
            abort_pct: 90.0,
            hard_stop_system_pct: 95.0,
        }
    }
}

impl BudgetPolicy {
    /// Classify a pair of readings.
    ///
    /// Host utilization is checked first so the host is protected even when
    /// the pressure is not ours.
    pub fn classify(&self, system_pct: f64, budget_usage_pct: f64) -> BudgetStatus {
        if system_pct >= self.hard_stop_system_pct {
            BudgetStatus::GlobalHardStop
        } else if budget_usage_pct >= self.abort_pct {
            BudgetStatus::BudgetAbort
        } else if budget_usage_pct >= self.warning_pct {
            BudgetStatus::BudgetWarning
        } else if budget_usage_pct >= self.observation_pct {
            BudgetStatus::Observation
        } else {
            BudgetStatus::Normal
        }
    }

    pub fn validate(&self) -> CadenceResult<()> {
        let thresholds = [
            ("budget.observation_pct", self.observation_pct),
            ("budget.warning_pct", self.warning_pct),
            ("budget.abort_pct", self.abort_pct),
            ("budget.hard_stop_system_pct", self.hard_stop_system_pct),
        ];
        for (field, value) in thresholds {
            if !(value > 0.0 && value <= 100.0) {
                return Err(ConfigError::invalid(field, value, "must be within (0, 100]").into());
            }
        }
        if !(self.observation_pct < self.warning_pct && self.warning_pct < self.abort_pct) {
            return Err(ConfigError::InvalidValue {
                field: "budget".to_string(),
                value: format!(
                    "{}/{}/{}",
                    self.observation_pct, self.warning_pct, self.abort_pct
                ),
                reason: "thresholds must satisfy observation < warning < abort".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Adaptive batching parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BatchPolicy {
    /// Estimated total rows above which the run is batched
    pub batching_threshold_rows: RowCount,
    /// Initial and maximum target rows per batch
    pub max_target_rows: RowCount,
    /// Floor for the shrinking target
    pub min_target_rows: RowCount,
    /// Multiplier applied on BUDGET_WARNING
    pub shrink_factor: f64,
    /// Multiplier applied after a confirmed stable streak
    pub growth_factor: f64,
    /// Consecutive NORMAL iterations required before growing
    pub stable_iterations: u32,
    /// Budget usage above which `relieve` pauses
    pub relieve_threshold_pct: f64,
    /// Pause length for `relieve`, in seconds
    pub relieve_wait_secs: u64,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batching_threshold_rows: 5_000_000,
            max_target_rows: 5_000_000,
            min_target_rows: 500_000,
            shrink_factor: 0.5,
            growth_factor: 1.5,
            stable_iterations: 3,
            relieve_threshold_pct: 80.0,
            relieve_wait_secs: 5,
        }
    }
}

impl BatchPolicy {
    pub fn relieve_wait(&self) -> StdDuration {
        StdDuration::from_secs(self.relieve_wait_secs)
    }

    /// Target after a warning: shrunk, floored at `min_target_rows`.
    pub fn shrink(&self, target_rows: RowCount) -> RowCount {
        let shrunk = (target_rows as f64 * self.shrink_factor).floor() as RowCount;
        shrunk.max(self.min_target_rows)
    }

    /// Target after a stable streak: grown, capped at `max_target_rows`.
    pub fn grow(&self, target_rows: RowCount) -> RowCount {
        let grown = (target_rows as f64 * self.growth_factor).floor() as RowCount;
        grown.min(self.max_target_rows)
    }

    pub fn validate(&self) -> CadenceResult<()> {
        if self.min_target_rows == 0 {
            return Err(ConfigError::invalid(
                "batching.min_target_rows",
                self.min_target_rows,
                "must be greater than 0",
            )
            .into());
        }
        if self.min_target_rows > self.max_target_rows {
            return Err(ConfigError::IncompatibleOptions {
                option_a: format!("batching.min_target_rows={}", self.min_target_rows),
                option_b: format!("batching.max_target_rows={}", self.max_target_rows),
            }
            .into());
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(ConfigError::invalid(
                "batching.shrink_factor",
                self.shrink_factor,
                "must be within (0, 1)",
            )
            .into());
        }
        if self.growth_factor <= 1.0 {
            return Err(ConfigError::invalid(
                "batching.growth_factor",
                self.growth_factor,
                "must be greater than 1",
            )
            .into());
        }
        if self.stable_iterations == 0 {
            return Err(ConfigError::invalid(
                "batching.stable_iterations",
                self.stable_iterations,
                "must be at least 1",
            )
            .into());
        }
        if !(self.relieve_threshold_pct > 0.0 && self.relieve_threshold_pct <= 100.0) {
            return Err(ConfigError::invalid(
                "batching.relieve_threshold_pct",
                self.relieve_threshold_pct,
                "must be within (0, 100]",
            )
            .into());
        }
        Ok(())
    }
}

/// Hard limits enforced by the size estimator and sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SystemLimits {
    pub max_days_hard_limit: i64,
    pub max_daily_volume_cap: RowCount,
    /// Optional user cap, effective only when below the hard cap
    pub max_daily_volume_limit: Option<RowCount>,
    pub max_disk_usage_gb: f64,
    /// Free space kept untouched on top of the estimate
    pub safety_buffer_gb: f64,
    /// Average serialized bytes per generated row
    pub bytes_per_row: u64,
    /// Free space a sink requires beyond each write's estimate
    pub sink_buffer_gb: f64,
    pub validate_disk_space: bool,
}

impl Default for SystemLimits {
    fn default() -> Self {
        Self {
            max_days_hard_limit: 3660,
            max_daily_volume_cap: 10_000_000,
            max_daily_volume_limit: None,
            max_disk_usage_gb: 10.0,
            safety_buffer_gb: 5.0,
            bytes_per_row: 64,
            sink_buffer_gb: 20.0,
            validate_disk_space: true,
        }
    }
}

impl SystemLimits {
    /// The lower of the hard cap and the user cap.
    pub fn effective_daily_cap(&self) -> RowCount {
        match self.max_daily_volume_limit {
            Some(user) => user.min(self.max_daily_volume_cap),
            None => self.max_daily_volume_cap,
        }
    }
}

/// Sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One JSON object per line; partitioned tables become directories
    #[default]
    Jsonl,
    /// Keep relations in memory (dry runs, tests)
    Memory,
}

// ============================================================================
// GENERATION CONFIG
// ============================================================================

fn default_output_path() -> PathBuf {
    PathBuf::from("data")
}

/// Master configuration for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub start_date: Date,
    pub end_date: Date,
    pub daily_avg_transactions: RowCount,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub budget: BudgetPolicy,
    #[serde(default)]
    pub batching: BatchPolicy,
    #[serde(default)]
    pub limits: SystemLimits,
}

impl GenerationConfig {
    /// Minimal configuration with every policy at its default.
    pub fn new(start_date: Date, end_date: Date, daily_avg_transactions: RowCount) -> Self {
        Self {
            start_date,
            end_date,
            daily_avg_transactions,
            seed: None,
            output_path: default_output_path(),
            output_format: OutputFormat::default(),
            profile: ProfileConfig::default(),
            budget: BudgetPolicy::default(),
            batching: BatchPolicy::default(),
            limits: SystemLimits::default(),
        }
    }

    /// The run range as a window.
    pub fn window(&self) -> CadenceResult<DateWindow> {
        DateWindow::new(self.start_date, self.end_date)
    }

    /// Rough total volume: days x daily average.
    pub fn estimated_total_rows(&self) -> RowCount {
        (days_inclusive(self.start_date, self.end_date) as RowCount)
            .saturating_mul(self.daily_avg_transactions)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - end_date >= start_date
    /// - daily_avg_transactions > 0 and within the effective daily cap
    /// - profile weight lengths and calendar rules
    /// - budget and batching policies
    pub fn validate(&self) -> CadenceResult<()> {
        self.window()?;

        if self.daily_avg_transactions == 0 {
            return Err(ConfigError::invalid(
                "daily_avg_transactions",
                self.daily_avg_transactions,
                "daily_avg_transactions must be greater than 0",
            )
            .into());
        }
        let cap = self.limits.effective_daily_cap();
        if self.daily_avg_transactions > cap {
            return Err(ResourceError::DailyVolumeTooHigh {
                requested: self.daily_avg_transactions,
                limit: cap,
            }
            .into());
        }

        self.validate_profile()?;
        self.budget.validate()?;
        self.batching.validate()?;

        if self.limits.max_days_hard_limit <= 0 {
            return Err(ConfigError::invalid(
                "limits.max_days_hard_limit",
                self.limits.max_days_hard_limit,
                "must be greater than 0",
            )
            .into());
        }
        if self.limits.bytes_per_row == 0 {
            return Err(ConfigError::invalid(
                "limits.bytes_per_row",
                self.limits.bytes_per_row,
                "must be greater than 0",
            )
            .into());
        }

        Ok(())
    }

    fn validate_profile(&self) -> CadenceResult<()> {
        let profile = &self.profile;

        if let Some(weights) = &profile.weekly_weights {
            if weights.len() != 7 {
                return Err(TimelineError::WeeklyWeightsLength { got: weights.len() }.into());
            }
        }
        if let Some(weights) = &profile.monthly_weights {
            if weights.len() != 12 {
                return Err(TimelineError::MonthlyWeightsLength { got: weights.len() }.into());
            }
        }

        for holiday in &profile.holidays {
            check_month_day("profile.holidays", holiday.month, holiday.day)?;
            check_factor("profile.holidays.factor", holiday.factor)?;
        }

        for ramp in &profile.ramps {
            match &ramp.anchor {
                DateAnchor::Fixed { month, day } => check_month_day("profile.ramps.anchor", *month, *day)?,
                DateAnchor::NthWeekday { month, weekday, nth } => {
                    check_month_day("profile.ramps.anchor", *month, 1)?;
                    if *weekday > 6 {
                        return Err(ConfigError::invalid(
                            "profile.ramps.anchor.weekday",
                            weekday,
                            "must be 0 (Monday) through 6 (Sunday)",
                        )
                        .into());
                    }
                    if !(1..=5).contains(nth) {
                        return Err(ConfigError::invalid(
                            "profile.ramps.anchor.nth",
                            nth,
                            "must be 1 through 5",
                        )
                        .into());
                    }
                }
            }
            if ramp.days_before == 0 {
                return Err(ConfigError::invalid(
                    "profile.ramps.days_before",
                    ramp.days_before,
                    "must be at least 1",
                )
                .into());
            }
            check_factor("profile.ramps.start_factor", ramp.start_factor)?;
            check_factor("profile.ramps.peak_factor", ramp.peak_factor)?;
        }

        for event in &profile.events {
            check_month_day("profile.events", event.month, event.first_day)?;
            check_month_day("profile.events", event.month, event.last_day)?;
            if event.last_day < event.first_day {
                return Err(ConfigError::IncompatibleOptions {
                    option_a: format!("profile.events.first_day={}", event.first_day),
                    option_b: format!("profile.events.last_day={}", event.last_day),
                }
                .into());
            }
            check_factor("profile.events.factor", event.factor)?;
        }

        Ok(())
    }
}

fn check_month_day(field: &str, month: u32, day: u32) -> CadenceResult<()> {
    if !(1..=12).contains(&month) {
        return Err(ConfigError::invalid(format!("{}.month", field), month, "must be 1 through 12").into());
    }
    if !(1..=31).contains(&day) {
        return Err(ConfigError::invalid(format!("{}.day", field), day, "must be 1 through 31").into());
    }
    Ok(())
}

fn check_factor(field: &str, factor: f64) -> CadenceResult<()> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(ConfigError::invalid(field, factor, "must be a positive finite number").into());
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> Date {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn base() -> GenerationConfig {
        GenerationConfig::new(d(2024, 1, 1), d(2024, 12, 31), 1000)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let cfg = GenerationConfig::new(d(2024, 2, 1), d(2024, 1, 1), 1000);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, CadenceError::Timeline(TimelineError::InvalidRange { .. })));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_zero_daily_average_rejected() {
        let cfg = GenerationConfig::new(d(2024, 1, 1), d(2024, 1, 2), 0);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, CadenceError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_daily_average_over_cap_rejected() {
        let cfg = GenerationConfig::new(d(2024, 1, 1), d(2024, 1, 3), u64::MAX / 2);
        assert_eq!(cfg.estimated_total_rows(), u64::MAX);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            CadenceError::Resource(ResourceError::DailyVolumeTooHigh { limit: 10_000_000, .. })
        ));

        let mut cfg = base();
        cfg.limits.max_daily_volume_limit = Some(500);
        assert!(cfg.validate().is_err());
        cfg.daily_avg_transactions = 500;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_weekly_weights_length_rejected() {
        let mut cfg = base();
        cfg.profile.weekly_weights = Some(vec![1.0; 6]);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            CadenceError::Timeline(TimelineError::WeeklyWeightsLength { got: 6 })
        ));
    }

    #[test]
    fn test_ramp_with_zero_days_rejected() {
        let mut cfg = base();
        cfg.profile.ramps.push(RampRule {
            anchor: DateAnchor::Fixed { month: 12, day: 24 },
            days_before: 0,
            start_factor: 1.1,
            peak_factor: 3.5,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_budget_policy_classify_tiers() {
        let policy = BudgetPolicy::default();
        assert_eq!(policy.classify(50.0, 0.0), BudgetStatus::Normal);
        assert_eq!(policy.classify(50.0, 65.0), BudgetStatus::Observation);
        assert_eq!(policy.classify(50.0, 85.0), BudgetStatus::BudgetWarning);
        assert_eq!(policy.classify(50.0, 95.0), BudgetStatus::BudgetAbort);
        assert_eq!(policy.classify(96.0, 0.0), BudgetStatus::GlobalHardStop);
    }

    #[test]
    fn test_budget_policy_boundaries_inclusive_lower() {
        let policy = BudgetPolicy::default();
        assert_eq!(policy.classify(10.0, 60.0), BudgetStatus::Observation);
        assert_eq!(policy.classify(10.0, 80.0), BudgetStatus::BudgetWarning);
        assert_eq!(policy.classify(10.0, 90.0), BudgetStatus::BudgetAbort);
        assert_eq!(policy.classify(95.0, 10.0), BudgetStatus::GlobalHardStop);
        assert_eq!(policy.classify(94.9, 59.9), BudgetStatus::Normal);
    }

    #[test]
    fn test_budget_policy_rejects_unordered_thresholds() {
        let policy = BudgetPolicy {
            observation_pct: 85.0,
            ..BudgetPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_batch_policy_shrink_and_grow() {
        let policy = BatchPolicy::default();
        assert_eq!(policy.shrink(5_000_000), 2_500_000);
        assert_eq!(policy.shrink(600_000), 500_000);
        assert_eq!(policy.grow(2_500_000), 3_750_000);
        assert_eq!(policy.grow(4_000_000), 5_000_000);
    }

    #[test]
    fn test_effective_daily_cap() {
        let mut limits = SystemLimits::default();
        assert_eq!(limits.effective_daily_cap(), limits.max_daily_volume_cap);
        limits.max_daily_volume_limit = Some(1_000);
        assert_eq!(limits.effective_daily_cap(), 1_000);
        limits.max_daily_volume_limit = Some(u64::MAX);
        assert_eq!(limits.effective_daily_cap(), limits.max_daily_volume_cap);
    }

    #[test]
    fn test_config_deserializes_from_toml() {
        let raw = r#"
            start_date = "2024-01-01"
            end_date = "2024-01-10"
            daily_avg_transactions = 600000

            [profile]
            name = "retail"
            preset = "retail"

            [[profile.ramps]]
            days_before = 7
            start_factor = 1.1
            peak_factor = 3.0
            anchor = { kind = "nth_weekday", month = 5, weekday = 6, nth = 2 }

            [batching]
            stable_iterations = 4
        "#;
        let cfg: GenerationConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.daily_avg_transactions, 600_000);
        assert_eq!(cfg.profile.preset, Some(ProfilePreset::Retail));
        assert_eq!(cfg.batching.stable_iterations, 4);
        assert_eq!(cfg.batching.max_target_rows, 5_000_000);
        assert_eq!(cfg.output_format, OutputFormat::Jsonl);
        assert!(matches!(
            cfg.profile.ramps[0].anchor,
            DateAnchor::NthWeekday { month: 5, weekday: 6, nth: 2 }
        ));
        assert_eq!(cfg.estimated_total_rows(), 6_000_000);
        assert!(cfg.validate().is_ok());
    }
}
