//! Cadence entry point.

use cadence_budget::{DiskGuard, MemoryBudgetMonitor, MemoryProbe, Pauser, SysinfoProbe, ThreadPauser};
use cadence_cli::commands::{generate, GenerateContext};
use cadence_cli::error::CliResult;
use cadence_cli::output::OutputManager;
use cadence_cli::settings::Settings;
use cadence_cli::summary::{render_estimate, render_report, render_runs};
use cadence_cli::telemetry::{init_logging, LogFormat};
use cadence_scheduler::{DynMonitor, RunOutcome};
use cadence_sinks::builtin_registry;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "cadence", version, about = "Seasonal synthetic transaction timelines")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a dataset for a registered domain
    Generate {
        domain: String,
        /// Directory holding defaults.toml, domains/ and main.toml
        #[arg(long, default_value = "config")]
        config_dir: PathBuf,
    },
    /// List registered domains
    Domains,
    /// Manage generated datasets
    #[command(subcommand)]
    Tools(ToolsCommand),
}

#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List runs and their size
    List {
        #[arg(long, short)]
        domain: Option<String>,
        #[arg(long, default_value = "data")]
        root: PathBuf,
    },
    /// Delete runs of one domain, or all runs
    Clear {
        #[arg(long, short, conflicts_with = "all")]
        domain: Option<String>,
        #[arg(long, short)]
        all: bool,
        /// Skip confirmation
        #[arg(long, short)]
        force: bool,
        #[arg(long, default_value = "data")]
        root: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    if let Err(e) = init_logging(format) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let result = match cli.command {
        Commands::Generate { domain, config_dir } => run_generate(&domain, config_dir),
        Commands::Domains => run_domains(),
        Commands::Tools(ToolsCommand::List { domain, root }) => run_list(domain.as_deref(), root),
        Commands::Tools(ToolsCommand::Clear {
            domain,
            all,
            force,
            root,
        }) => run_clear(domain.as_deref(), all, force, root),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_generate(domain: &str, config_dir: PathBuf) -> CliResult<i32> {
    let registry = builtin_registry();
    let settings = Settings::new(config_dir).resolve(domain)?;
    let mut monitor: DynMonitor = MemoryBudgetMonitor::new(
        Box::new(SysinfoProbe::new()) as Box<dyn MemoryProbe + Send>,
        settings.config.budget.clone(),
    )
    .with_pauser(Box::new(ThreadPauser) as Box<dyn Pauser + Send>);

    let outcome = generate(
        domain,
        settings,
        GenerateContext {
            registry: &registry,
            monitor: &mut monitor,
            disk: &DiskGuard::new(),
            started_at: chrono::Local::now().naive_local(),
            cancel: None,
        },
    )?;

    println!("{}", render_estimate(&outcome.estimate));
    print!("{}", render_report(&outcome.report, &outcome.run_dir, outcome.size_bytes));
    Ok(match outcome.report.outcome {
        RunOutcome::Aborted(_) => 2,
        RunOutcome::Completed | RunOutcome::Cancelled => 0,
    })
}

fn run_domains() -> CliResult<i32> {
    let registry = builtin_registry();
    for name in registry.names() {
        let handler = registry.get(name)?;
        println!("{:<12} {}", name, handler.description());
    }
    Ok(0)
}

fn run_list(domain: Option<&str>, root: PathBuf) -> CliResult<i32> {
    let runs = OutputManager::new(root).list_runs(domain)?;
    println!("{}", render_runs(&runs));
    Ok(0)
}

fn run_clear(domain: Option<&str>, all: bool, force: bool, root: PathBuf) -> CliResult<i32> {
    if domain.is_none() && !all {
        eprintln!("Specify --domain <name> or --all");
        return Ok(1);
    }
    let output = OutputManager::new(root);
    let targets = output.clear_targets(if all { None } else { domain })?;
    if targets.is_empty() {
        println!("Nothing to delete");
        return Ok(0);
    }

    println!("Deleting {} run folder(s)", targets.len());
    if !force && !confirm("Are you sure? [y/N] ")? {
        return Ok(0);
    }
    let removed = output.remove(&targets)?;
    println!("Deleted {} folder(s)", removed);
    Ok(0)
}

fn confirm(prompt: &str) -> CliResult<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
