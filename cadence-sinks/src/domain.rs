//! The `timeline` domain and the built-in registry.

use crate::jsonl::JsonlSink;
use crate::memory::MemorySink;
use crate::timeline::{TimelineDatasetBuilder, TimelineRow};
use cadence_core::{CadenceResult, GenerationConfig, OutputFormat};
use cadence_scheduler::{DomainHandler, DomainRegistry, GenerationRunner, RunEnvironment, RunReport};
use std::sync::Arc;
use tracing::info;

/// Seed used when a configuration reaches the handler without one.
pub const FALLBACK_SEED: u64 = 0;

/// Daily volume plan and event skeleton for the configured range.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimelineDomain;

impl DomainHandler for TimelineDomain {
    fn name(&self) -> &'static str {
        "timeline"
    }

    fn description(&self) -> &'static str {
        "Per-day volumes and per-event skeleton rows"
    }

    fn execute(&self, config: &GenerationConfig, env: RunEnvironment<'_>) -> CadenceResult<RunReport> {
        config.validate()?;
        let seed = config.seed.unwrap_or(FALLBACK_SEED);
        let mut builder = TimelineDatasetBuilder::new(config, seed)?;

        let mut runner = GenerationRunner::new(config);
        if let Some(flag) = &env.cancel {
            runner = runner.with_cancel_flag(Arc::clone(flag));
        }

        info!(
            domain = self.name(),
            seed,
            format = ?config.output_format,
            output_dir = %env.output_dir.display(),
            "Domain run started"
        );

        match config.output_format {
            OutputFormat::Jsonl => {
                let sink = JsonlSink::new(&env.output_dir);
                let mut sink = if config.limits.validate_disk_space {
                    sink.with_space_check(config.limits.bytes_per_row, config.limits.sink_buffer_gb)
                } else {
                    sink.without_space_check()
                };
                runner.run(env.monitor, &mut builder, &mut sink)
            }
            OutputFormat::Memory => {
                let mut sink = MemorySink::<TimelineRow>::new();
                runner.run(env.monitor, &mut builder, &mut sink)
            }
        }
    }
}

/// Registry with every built-in domain.
pub fn builtin_registry() -> DomainRegistry {
    DomainRegistry::new().register(Box::new(TimelineDomain))
}
