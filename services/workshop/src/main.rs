//! Santa's Workshop
//!
//! Usage:
//!   santa-workshop NE NR TE TR [--dynamic] [--output FILE] [--config FILE]
//!
//! Starts Santa, NE elves and NR reindeer as separate processes sharing one
//! region and one action log. With `--dynamic`, `SIGUSR1` recruits more elves
//! while the workshop is open.
//!
//! Only the manager runs a tokio runtime. Actor processes are plain blocking
//! code, so `main` builds the runtime after dispatching the `actor` subcommand.

mod actor_process;
mod control;
mod lifecycle;
mod spawner;

use actor_process::ActorArgs;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use workshop_config::service::output::ACTOR_LOG_LEVEL;
use workshop_config::{SimulationConfig, WorkshopSettings};

#[derive(Parser, Debug)]
#[command(name = "santa-workshop")]
#[command(about = "Santa, elves and reindeer synchronized across processes")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    /// Number of elves (1-999)
    #[arg(value_name = "NE", required = true)]
    elves: Option<u32>,

    /// Number of reindeer (1-19)
    #[arg(value_name = "NR", required = true)]
    reindeer: Option<u32>,

    /// Maximum elf work time in ms (0-1000)
    #[arg(value_name = "TE", required = true)]
    elf_work_ms: Option<u32>,

    /// Maximum reindeer vacation time in ms (0-1000)
    #[arg(value_name = "TR", required = true)]
    reindeer_vacation_ms: Option<u32>,

    /// Recruit additional elves on SIGUSR1
    #[arg(long)]
    dynamic: bool,

    /// Action log path (default: proj2.out)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single actor against an existing region
    #[command(hide = true)]
    Actor(ActorArgs),
}

impl Cli {
    fn simulation(&self) -> Result<SimulationConfig> {
        let required = |value: Option<u32>, name: &str| {
            value.ok_or_else(|| anyhow!("missing argument {}", name))
        };
        let config = SimulationConfig::new(
            required(self.elves, "NE")?,
            required(self.reindeer, "NR")?,
            required(self.elf_work_ms, "TE")?,
            required(self.reindeer_vacation_ms, "TR")?,
        )
        .with_dynamic_elves(self.dynamic);
        Ok(config.validated()?)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Actor(args)) = cli.command {
        init_logging(None, ACTOR_LOG_LEVEL)?;
        return actor_process::run(args);
    }

    let config = cli.simulation()?;
    let mut settings =
        WorkshopSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(output) = cli.output {
        settings.output = output;
    }

    init_logging(cli.log_level.as_deref(), &settings.log_level)?;

    info!(
        "Opening the workshop: {} elves, {} reindeer, TE={}ms, TR={}ms{}",
        config.elves,
        config.reindeer,
        config.elf_work_ms,
        config.reindeer_vacation_ms,
        if config.dynamic_elves { ", dynamic elves" } else { "" }
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime
        .block_on(lifecycle::run(config, &settings))
        .context("Workshop run failed")?;

    Ok(())
}

/// Diagnostics go to stderr; an explicit level beats `RUST_LOG`, which beats
/// the configured default.
fn init_logging(explicit: Option<&str>, default_level: &str) -> Result<()> {
    let filter = match explicit {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level)),
    }
    .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}
