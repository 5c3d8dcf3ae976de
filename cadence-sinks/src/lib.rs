//! Cadence Sinks - Collaborators and the Built-in Domain
//!
//! ```text
//! TimelineDatasetBuilder --(window)--> {daily_volume, events}
//!          |                                   |
//!          v                                   v
//!   TimelineGenerator                JsonlSink | MemorySink
//! ```
//!
//! The scheduler only sees the `DatasetBuilder` and `Sink` seams; this crate
//! supplies the concrete implementations and the `timeline` domain handler.

pub mod domain;
pub mod jsonl;
pub mod memory;
pub mod timeline;

pub use domain::{builtin_registry, TimelineDomain, FALLBACK_SEED};
pub use jsonl::JsonlSink;
pub use memory::MemorySink;
pub use timeline::{
    DailyVolumeRow, EventRow, TimelineDatasetBuilder, TimelineRow, DAILY_VOLUME_TABLE, EVENTS_TABLE,
};
