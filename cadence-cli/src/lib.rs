//! Cadence CLI library exports.

pub mod commands;
pub mod error;
pub mod output;
pub mod settings;
pub mod summary;
pub mod telemetry;
