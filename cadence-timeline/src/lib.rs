//! Cadence Timeline - Temporal-Seasonal Volume Engine
//!
//! Converts a date range and a base daily average into a per-day event
//! count, then into a flat per-event date sequence:
//!
//! ```text
//! ProfileConfig ──build_profile──► TimeProfile
//!                                       │
//!            DateWindow + daily avg ────┤
//!                                       ▼
//!                              TimelineGenerator ──► DailyVolumePlan ──► EventSkeleton
//! ```
//!
//! Nothing here materializes rows. Dataset builders consume the skeleton.

pub mod calendar;
pub mod expand;
pub mod profile;
pub mod sampling;
pub mod timeline;

pub use calendar::{
    build_profile, expand_special_dates, holiday_table, nth_weekday, resolve_anchor,
    weekday_from_monday, SpecialDates,
};
pub use expand::{expand_events, EventSkeleton};
pub use profile::{payday_multiplier, TimeProfile, MIN_FACTOR};
pub use sampling::{macro_year_factor, sample_count};
pub use timeline::{DailyVolumePlan, DayVolume, TimelineGenerator};
