//! Domain handlers.
//!
//! Each business domain implements [`DomainHandler`] and is registered once
//! at startup. Lookup is by name through an explicit table.

use crate::report::RunReport;
use cadence_budget::{MemoryBudgetMonitor, MemoryProbe, Pauser};
use cadence_core::{CadenceResult, ConfigError, GenerationConfig};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Monitor with type-erased probe and pauser, as handed to domain handlers.
pub type DynMonitor = MemoryBudgetMonitor<Box<dyn MemoryProbe + Send>, Box<dyn Pauser + Send>>;

/// What a handler needs from the caller for one run.
pub struct RunEnvironment<'a> {
    /// Directory that receives this run's tables
    pub output_dir: PathBuf,
    pub monitor: &'a mut DynMonitor,
    pub cancel: Option<Arc<AtomicBool>>,
}

/// One business domain.
pub trait DomainHandler: Send + Sync {
    /// Registry key, e.g. `timeline`.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Generate the domain's tables for `config` into `env.output_dir`.
    fn execute(&self, config: &GenerationConfig, env: RunEnvironment<'_>) -> CadenceResult<RunReport>;
}

/// Name-to-handler table.
#[derive(Default)]
pub struct DomainRegistry {
    handlers: BTreeMap<&'static str, Box<dyn DomainHandler>>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. A later handler with the same name replaces the earlier.
    pub fn register(mut self, handler: Box<dyn DomainHandler>) -> Self {
        self.handlers.insert(handler.name(), handler);
        self
    }

    pub fn get(&self, name: &str) -> CadenceResult<&dyn DomainHandler> {
        self.handlers
            .get(name)
            .map(|h| h.as_ref())
            .ok_or_else(|| {
                ConfigError::UnknownDomain {
                    domain: name.to_string(),
                }
                .into()
            })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}
