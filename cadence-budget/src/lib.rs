//! Cadence Budget - Resource Guards
//!
//! Memory budget monitoring for the adaptive scheduler, plus the disk guard
//! and size estimator that gate a run before it starts.
//!
//! ```text
//!   MemoryProbe ──► MemoryBudgetMonitor ──► BudgetReading ──► scheduler
//!                        (baseline, peaks)
//!
//!   DiskSpace ──► SizeEstimator ──► SizeEstimate | ResourceError
//! ```

pub mod disk;
pub mod estimator;
pub mod monitor;
pub mod probe;

pub use disk::{DiskGuard, DiskSpace, FixedDiskSpace};
pub use estimator::{estimated_bytes, estimated_gb, SizeEstimate, SizeEstimator, UNCERTAINTY_FACTOR};
pub use monitor::{BudgetReading, MemoryBudgetMonitor, Pauser, ResourceBudgetState, ThreadPauser};
pub use probe::{MemoryProbe, MemoryReading, SysinfoProbe};
