//! Pre-run size estimation and guardrails.
//!
//! Checks run in this order, and the first failure wins:
//! 1. the range is valid and no longer than the hard day limit
//! 2. the daily volume is within min(hard cap, user cap)
//! 3. the estimate fits the user's disk usage limit
//! 4. the output filesystem has the estimate plus a safety buffer free

use crate::disk::DiskSpace;
use cadence_core::{
    bytes_to_gb, days_inclusive, CadenceResult, GenerationConfig, ResourceError, RowCount,
    SystemLimits, TimelineError,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Overhead allowance for metadata and variable-width fields.
pub const UNCERTAINTY_FACTOR: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub days: i64,
    pub total_rows: RowCount,
    pub estimated_gb: f64,
}

pub struct SizeEstimator<'a> {
    limits: &'a SystemLimits,
}

impl<'a> SizeEstimator<'a> {
    pub fn new(limits: &'a SystemLimits) -> Self {
        Self { limits }
    }

    /// Validate limits and estimate the output size, without touching disk.
    pub fn estimate(&self, config: &GenerationConfig) -> CadenceResult<SizeEstimate> {
        if config.end_date < config.start_date {
            return Err(TimelineError::InvalidRange {
                start: config.start_date,
                end: config.end_date,
            }
            .into());
        }

        let days = days_inclusive(config.start_date, config.end_date);
        if days > self.limits.max_days_hard_limit {
            return Err(ResourceError::RangeTooLong {
                days,
                limit: self.limits.max_days_hard_limit,
            }
            .into());
        }

        let cap = self.limits.effective_daily_cap();
        if config.daily_avg_transactions > cap {
            return Err(ResourceError::DailyVolumeTooHigh {
                requested: config.daily_avg_transactions,
                limit: cap,
            }
            .into());
        }

        let total_rows = (days as RowCount).saturating_mul(config.daily_avg_transactions);
        let bytes = total_rows as f64 * self.limits.bytes_per_row as f64 * UNCERTAINTY_FACTOR;
        let estimated_gb = bytes / cadence_core::BYTES_PER_GB;

        if estimated_gb > self.limits.max_disk_usage_gb {
            return Err(ResourceError::EstimateOverLimit {
                estimated_gb,
                limit_gb: self.limits.max_disk_usage_gb,
            }
            .into());
        }

        Ok(SizeEstimate {
            days,
            total_rows,
            estimated_gb,
        })
    }

    /// [`estimate`](Self::estimate), then check free space at the output path.
    pub fn validate_and_estimate<D: DiskSpace>(
        &self,
        config: &GenerationConfig,
        disk: &D,
    ) -> CadenceResult<SizeEstimate> {
        let estimate = self.estimate(config)?;

        if self.limits.validate_disk_space {
            let needed_gb = estimate.estimated_gb + self.limits.safety_buffer_gb;
            if let Some(free_gb) = disk.free_gb(&config.output_path) {
                if free_gb < needed_gb {
                    return Err(ResourceError::InsufficientDisk { needed_gb, free_gb }.into());
                }
            }
        }

        info!(
            days = estimate.days,
            total_rows = estimate.total_rows,
            estimated_gb = estimate.estimated_gb,
            "Size estimate accepted"
        );
        Ok(estimate)
    }
}

/// Bytes a write of `rows` rows is expected to need.
pub fn estimated_bytes(rows: RowCount, bytes_per_row: u64) -> u64 {
    rows.saturating_mul(bytes_per_row)
}

/// GB a write of `rows` rows is expected to need.
pub fn estimated_gb(rows: RowCount, bytes_per_row: u64) -> f64 {
    bytes_to_gb(estimated_bytes(rows, bytes_per_row))
}
