//! Actor process entry
//!
//! Attaches to the manager's region, runs one actor and exits. A failure is
//! reported to the manager with `SIGTERM` so the whole run is aborted instead
//! of waiting forever for this actor's `child_finished`.

use anyhow::{Context, Result};
use clap::Args;
use ipc::SharedRegion;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{getppid, Pid};
use std::path::PathBuf;
use tracing::{debug, error};
use workshop_actors::{run_role, ActorKind, ActorLabel, Journal, Workshop};

#[derive(Args, Debug)]
pub struct ActorArgs {
    /// santa, elf or reindeer
    #[arg(long)]
    pub role: ActorKind,

    /// Actor id (ignored for Santa)
    #[arg(long, default_value_t = 0)]
    pub id: u32,

    /// Shared region created by the manager
    #[arg(long)]
    pub region: PathBuf,

    /// Action log to append to
    #[arg(long)]
    pub output: PathBuf,

    /// Pid of the manager to alert on failure
    #[arg(long)]
    pub manager_pid: Option<i32>,
}

pub fn run(args: ActorArgs) -> Result<()> {
    let label = ActorLabel::new(args.role, args.id);
    let result = run_attached(&args);

    if let Err(e) = &result {
        error!("{} failed: {:#}", label, e);
        alert_manager(args.manager_pid);
    }
    result
}

fn run_attached(args: &ActorArgs) -> Result<()> {
    let region = SharedRegion::<Workshop>::attach(&args.region)
        .with_context(|| format!("Failed to attach to {:?}", args.region))?;

    let mut journal = Journal::open(&region, &args.output)?;
    run_role(args.role, args.id, &region, &mut journal)?;

    debug!("{} done", ActorLabel::new(args.role, args.id));
    Ok(())
}

/// Ask the manager to abort, if it is still our parent
fn alert_manager(manager_pid: Option<i32>) {
    let Some(manager_pid) = manager_pid else {
        return;
    };

    let parent = getppid();
    if parent != Pid::from_raw(manager_pid) {
        debug!("Manager {} is no longer our parent", manager_pid);
        return;
    }

    if let Err(e) = kill(parent, Signal::SIGTERM) {
        error!("Failed to alert manager {}: {}", parent, e);
    }
}
