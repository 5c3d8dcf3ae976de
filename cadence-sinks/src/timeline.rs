//! Built-in `timeline` dataset builder.
//!
//! Emits two tables per window:
//!
//! ```text
//! daily_volume   one row per day: factors, expected volume, sampled count
//! events         one row per event: sequential id and date
//! ```
//!
//! The profile is built once for the whole configured range and a single
//! random source is carried across windows, so a batched run draws the same
//! counts as a single pass with the same seed.

use cadence_core::{BuildError, CadenceResult, Date, DateWindow, GenerationConfig, RowCount};
use cadence_scheduler::DatasetBuilder;
use cadence_timeline::{build_profile, DayVolume, TimeProfile, TimelineGenerator};
use chrono::Weekday;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const DAILY_VOLUME_TABLE: &str = "daily_volume";
pub const EVENTS_TABLE: &str = "events";

/// Row of the `daily_volume` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVolumeRow {
    pub date: Date,
    pub weekday: Weekday,
    pub composite_factor: f64,
    pub macro_factor: f64,
    pub jitter: f64,
    pub expected_volume: f64,
    pub count: RowCount,
}

impl From<&DayVolume> for DailyVolumeRow {
    fn from(day: &DayVolume) -> Self {
        Self {
            date: day.date,
            weekday: day.weekday,
            composite_factor: day.composite_factor,
            macro_factor: day.macro_factor,
            jitter: day.jitter,
            expected_volume: day.expected_volume,
            count: day.count,
        }
    }
}

/// Row of the `events` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub event_id: u64,
    pub date: Date,
}

/// Either table's row; serialized without a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimelineRow {
    Day(DailyVolumeRow),
    Event(EventRow),
}

/// Builds `daily_volume` and `events` for consecutive windows of one run.
#[derive(Debug)]
pub struct TimelineDatasetBuilder {
    range: DateWindow,
    daily_average: f64,
    profile: TimeProfile,
    rng: StdRng,
    next_event_id: u64,
}

impl TimelineDatasetBuilder {
    pub fn new(config: &GenerationConfig, seed: u64) -> CadenceResult<Self> {
        let range = config.window()?;
        let profile = build_profile(&config.profile, range)?;
        Ok(Self {
            range,
            daily_average: config.daily_avg_transactions as f64,
            profile,
            rng: StdRng::seed_from_u64(seed),
            next_event_id: 1,
        })
    }

    pub fn profile(&self) -> &TimeProfile {
        &self.profile
    }

    /// Id the next emitted event will carry.
    pub fn next_event_id(&self) -> u64 {
        self.next_event_id
    }
}

impl DatasetBuilder for TimelineDatasetBuilder {
    type Relation = Vec<TimelineRow>;

    fn build_batch(&mut self, window: DateWindow) -> CadenceResult<BTreeMap<String, Vec<TimelineRow>>> {
        if window.start() < self.range.start() || window.end() > self.range.end() {
            return Err(BuildError::WindowFailed {
                start: window.start(),
                end: window.end(),
                reason: format!("outside run range {}", self.range),
            }
            .into());
        }

        let plan = TimelineGenerator::new(window, self.daily_average, self.profile.clone())
            .with_run_start(self.range.start())
            .generate(&mut self.rng);

        let days: Vec<TimelineRow> = plan
            .iter()
            .map(|day| TimelineRow::Day(DailyVolumeRow::from(day)))
            .collect();

        let first_id = self.next_event_id;
        let events: Vec<TimelineRow> = plan
            .events()
            .zip(first_id..)
            .map(|(date, event_id)| TimelineRow::Event(EventRow { event_id, date }))
            .collect();
        self.next_event_id = first_id + events.len() as u64;

        debug!(
            window = %window,
            days = days.len(),
            events = events.len(),
            first_event_id = first_id,
            "Timeline batch built"
        );

        let mut tables = BTreeMap::new();
        tables.insert(DAILY_VOLUME_TABLE.to_string(), days);
        tables.insert(EVENTS_TABLE.to_string(), events);
        Ok(tables)
    }
}
