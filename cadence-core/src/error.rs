//! Error types for Cadence operations

use chrono::NaiveDate;
use thiserror::Error;

/// Configuration errors. Raised before any generation work starts.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },

    #[error("Domain not registered: {domain}")]
    UnknownDomain { domain: String },

    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },
}

impl ConfigError {
    /// Shorthand for the most common validation failure.
    pub fn invalid(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Calendar/timeline errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("End date ({end}) cannot be before start date ({start})")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Weekly weights must have exactly 7 entries, got {got}")]
    WeeklyWeightsLength { got: usize },

    #[error("Monthly weights must have exactly 12 entries, got {got}")]
    MonthlyWeightsLength { got: usize },

    #[error("Invalid calendar rule {rule}: {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// Resource guard errors (memory budget, disk, size estimation).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResourceError {
    #[error("Memory budget already initialized for this run")]
    BudgetAlreadyInitialized,

    #[error("Requested duration {days} days exceeds the hard limit of {limit} days")]
    RangeTooLong { days: i64, limit: i64 },

    #[error("Requested daily volume {requested} exceeds the limit of {limit}")]
    DailyVolumeTooHigh { requested: u64, limit: u64 },

    #[error("Estimated size {estimated_gb:.2} GB exceeds the configured limit of {limit_gb:.2} GB")]
    EstimateOverLimit { estimated_gb: f64, limit_gb: f64 },

    #[error("Insufficient disk space: need {needed_gb:.2} GB free, only {free_gb:.2} GB available")]
    InsufficientDisk { needed_gb: f64, free_gb: f64 },
}

/// Sink (persistence collaborator) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("Write failed for table {table}: {reason}")]
    WriteFailed { table: String, reason: String },

    #[error("Insufficient disk space to write table {table}")]
    InsufficientSpace { table: String },

    #[error("Output directory error at {path}: {reason}")]
    Directory { path: String, reason: String },
}

/// Dataset builder errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Build failed for window {start}..={end}: {reason}")]
    WindowFailed {
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },
}

/// Master error type for all Cadence errors.
#[derive(Debug, Clone, Error)]
pub enum CadenceError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),
}

impl CadenceError {
    /// True for errors that are raised before any work is performed.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CadenceError::Config(_) | CadenceError::Timeline(_))
    }
}

/// Result type alias for Cadence operations.
pub type CadenceResult<T> = Result<T, CadenceError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_display() {
        let err = TimelineError::InvalidRange {
            start: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("2024-01-01"));
        assert!(msg.contains("2024-02-01"));
    }

    #[test]
    fn test_config_error_invalid_helper() {
        let err = ConfigError::invalid("daily_avg_transactions", 0, "must be positive");
        let msg = format!("{}", err);
        assert!(msg.contains("daily_avg_transactions"));
        assert!(msg.contains("0"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_resource_error_display_disk() {
        let err = ResourceError::InsufficientDisk {
            needed_gb: 25.5,
            free_gb: 3.25,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("25.50"));
        assert!(msg.contains("3.25"));
    }

    #[test]
    fn test_master_error_from_and_classification() {
        let err: CadenceError = TimelineError::WeeklyWeightsLength { got: 5 }.into();
        assert!(err.is_configuration());
        assert!(format!("{}", err).contains("exactly 7"));

        let err: CadenceError = SinkError::WriteFailed {
            table: "events".to_string(),
            reason: "disk gone".to_string(),
        }
        .into();
        assert!(!err.is_configuration());
    }
}
