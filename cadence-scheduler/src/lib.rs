//! Cadence Scheduler - Memory-Paced Generation
//!
//! Plans contiguous date windows, paces them against the memory budget and
//! hands each window to a dataset builder and a sink. Only dates, counts and
//! window boundaries cross this crate; rows stay with the collaborators.

pub mod planner;
pub mod registry;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod traits;

pub use planner::{days_per_batch, next_window, split_date_range, BatchPlan};
pub use registry::{DomainHandler, DomainRegistry, DynMonitor, RunEnvironment};
pub use report::{
    AbortReport, BatchRecord, RunMode, RunOutcome, RunReport, SchedulerPhase, TableSummary,
};
pub use runner::GenerationRunner;
pub use scheduler::{AdaptiveBatchScheduler, SchedulerState, DRIFT_REPORT_GB};
pub use traits::{DatasetBuilder, Sink, TableLocation, WriteReceipt};
