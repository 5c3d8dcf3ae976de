//! Host introspection seam.

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};

/// One consistent set of memory figures, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub total_bytes: u64,
    pub available_bytes: u64,
    /// Host-wide utilization, 0-100
    pub system_pct: f64,
    /// Resident memory of this process
    pub process_rss_bytes: u64,
}

impl MemoryReading {
    /// Derive `system_pct` from total and available.
    pub fn from_bytes(total_bytes: u64, available_bytes: u64, process_rss_bytes: u64) -> Self {
        let system_pct = if total_bytes == 0 {
            0.0
        } else {
            total_bytes.saturating_sub(available_bytes) as f64 / total_bytes as f64 * 100.0
        };
        Self {
            total_bytes,
            available_bytes,
            system_pct,
            process_rss_bytes,
        }
    }
}

/// Source of memory readings.
///
/// Implementations must be cheap; the scheduler samples on every iteration.
pub trait MemoryProbe {
    fn read(&mut self) -> MemoryReading;
}

impl<P: MemoryProbe + ?Sized> MemoryProbe for Box<P> {
    fn read(&mut self) -> MemoryReading {
        (**self).read()
    }
}

/// Host-wide probe backed by `sysinfo`.
///
/// Reports host memory, not a cgroup limit.
pub struct SysinfoProbe {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn read(&mut self) -> MemoryReading {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let available = self.system.available_memory();

        let rss = match self.pid {
            Some(pid) => {
                self.system.refresh_process(pid);
                self.system.process(pid).map(|p| p.memory()).unwrap_or(0)
            }
            None => 0,
        };

        MemoryReading::from_bytes(total, available, rss)
    }
}
