//! Command implementations, kept apart from argument parsing so they can run
//! against fakes.

use crate::error::CliResult;
use crate::output::{dir_size, OutputManager};
use crate::settings::ResolvedSettings;
use cadence_budget::{DiskSpace, SizeEstimate, SizeEstimator};
use cadence_scheduler::{DomainRegistry, DynMonitor, RunEnvironment, RunReport};
use chrono::NaiveDateTime;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// What `generate` produced.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub run_dir: PathBuf,
    pub estimate: SizeEstimate,
    pub report: RunReport,
    pub size_bytes: u64,
}

/// Everything `generate` needs besides the merged settings.
pub struct GenerateContext<'a, D> {
    pub registry: &'a DomainRegistry,
    pub monitor: &'a mut DynMonitor,
    pub disk: &'a D,
    /// Timestamp for the run directory name
    pub started_at: NaiveDateTime,
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Validate, estimate, create the run directory and hand off to the domain.
///
/// Nothing is written when validation or the size estimate fails.
pub fn generate<D: DiskSpace>(
    domain: &str,
    settings: ResolvedSettings,
    ctx: GenerateContext<'_, D>,
) -> CliResult<GenerateOutcome> {
    let handler = ctx.registry.get(domain)?;
    let config = settings.config;
    config.validate()?;

    let estimate = SizeEstimator::new(&config.limits).validate_and_estimate(&config, ctx.disk)?;

    let run_dir = OutputManager::new(&config.output_path).create_run_dir(domain, ctx.started_at)?;

    if !ctx.monitor.is_initialized() {
        ctx.monitor.initialize()?;
    }
    let baseline = ctx.monitor.state();
    info!(
        domain,
        seed = settings.seed,
        output = %run_dir.display(),
        baseline_system_pct = baseline.baseline_system_pct,
        budget_gb = baseline.baseline_available_gb,
        "Generation started"
    );

    let report = handler.execute(
        &config,
        RunEnvironment {
            output_dir: run_dir.clone(),
            monitor: ctx.monitor,
            cancel: ctx.cancel,
        },
    )?;

    let size_bytes = dir_size(&run_dir)?;
    Ok(GenerateOutcome {
        run_dir,
        estimate,
        report,
        size_bytes,
    })
}
