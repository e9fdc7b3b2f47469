//! Lifecycle Manager
//!
//! Owns the shared region and every actor process of one run.
//!
//! ```text
//! prepare ──► spawn Santa, Elf 1..=NE, RD 1..=NR ──► event loop ──► finish
//!   (truncate output,                                   │
//!    create region)          ┌──────────────────────────┤
//!                            │ reaper done    → wait children, teardown, Ok
//!                            │ SIGUSR1        → recruit elves (dynamic); a
//!                            │                  failed spawn only shrinks
//!                            │                  the batch
//!                            │ SIGINT/TERM/QUIT, failure
//!                            │                → stop reaper, kill children,
//!                            │                  teardown, Err
//!                            └──────────────────────────
//! ```
//!
//! The reaper runs on a blocking thread and consumes `child_finished` until
//! it has seen `1 + NR + elf_population` permits. The population is re-read
//! after every permit, so elves recruited mid-run are waited for too.

use crate::control::{ControlChannel, ControlEvent, FatalSignal};
use crate::spawner::{ActorHandle, Spawner};
use ipc::{IpcError, SharedRegion, TeardownError};
use rand::Rng;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};
use workshop_actors::{ActorLabel, Roster, Workshop};
use workshop_config::{SimulationConfig, WorkshopSettings};

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Failed to create shared region: {0}")]
    Resources(#[source] IpcError),

    #[error("Failed to prepare output file {path:?}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to locate the executable for actor processes: {0}")]
    Executable(#[source] std::io::Error),

    #[error("Failed to spawn {label}: {source}")]
    Spawn {
        label: ActorLabel,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("Received {0}")]
    Interrupted(FatalSignal),

    #[error("Shared state operation failed: {0}")]
    Shared(#[from] IpcError),

    #[error("Reaper task failed: {0}")]
    Reaper(#[from] JoinError),

    #[error("Failed to wait for {label}: {source}")]
    Wait {
        label: ActorLabel,
        #[source]
        source: std::io::Error,
    },

    #[error("{label} exited with {status}")]
    ActorFailed { label: ActorLabel, status: ExitStatus },

    #[error("Shared region still referenced at teardown")]
    RegionInUse,

    #[error(transparent)]
    Teardown(#[from] TeardownError),
}

/// Run one simulation from allocation to teardown
pub async fn run(config: SimulationConfig, settings: &WorkshopSettings) -> Result<u32, LifecycleError> {
    let mut control =
        ControlChannel::install(config.dynamic_elves).map_err(LifecycleError::Signals)?;
    let mut lifecycle = Lifecycle::prepare(config, settings)?;
    let outcome = lifecycle.supervise(&mut control).await;
    lifecycle.finish(outcome).await
}

pub struct Lifecycle {
    region: Arc<SharedRegion<Workshop>>,
    spawner: Spawner,
    children: Vec<ActorHandle>,
    abort: Arc<AtomicBool>,
}

impl Lifecycle {
    /// Truncate the action log and allocate the shared region
    pub fn prepare(config: SimulationConfig, settings: &WorkshopSettings) -> Result<Self, LifecycleError> {
        File::create(&settings.output).map_err(|source| LifecycleError::Output {
            path: settings.output.clone(),
            source,
        })?;

        let region_path = settings.region_path(std::process::id());
        let region = SharedRegion::<Workshop>::create(&region_path, Roster::from(config))
            .map_err(LifecycleError::Resources)?;
        info!("Shared region ready at {:?}", region_path);

        let spawner = match Spawner::current_exe(&region_path, &settings.output) {
            Ok(spawner) => spawner,
            Err(e) => {
                if let Err(t) = unsafe { region.teardown() } {
                    error!("{}", t);
                }
                return Err(LifecycleError::Executable(e));
            }
        };

        let mut lifecycle = Self::with_spawner(region, spawner);
        lifecycle.children.reserve(config.initial_actor_count() as usize);
        Ok(lifecycle)
    }

    pub fn with_spawner(region: SharedRegion<Workshop>, spawner: Spawner) -> Self {
        Self {
            region: Arc::new(region),
            spawner,
            children: Vec::new(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    fn spawn(&mut self, label: ActorLabel) -> Result<(), LifecycleError> {
        let handle = self
            .spawner
            .spawn(label)
            .map_err(|source| LifecycleError::Spawn { label, source })?;
        self.children.push(handle);
        Ok(())
    }

    fn spawn_initial(&mut self) -> Result<(), LifecycleError> {
        let roster = *self.region.roster();

        self.spawn(ActorLabel::Santa)?;
        for id in 1..=roster.elves {
            self.spawn(ActorLabel::Elf(id))?;
        }
        for id in 1..=roster.reindeer {
            self.spawn(ActorLabel::Reindeer(id))?;
        }

        info!(
            "Spawned Santa, {} elves and {} reindeer",
            roster.elves, roster.reindeer
        );
        Ok(())
    }

    fn start_reaper(&self) -> JoinHandle<Result<u32, IpcError>> {
        let region = Arc::clone(&self.region);
        let abort = Arc::clone(&self.abort);
        tokio::task::spawn_blocking(move || reap(&region, &abort))
    }

    /// Spawn the initial actors and react to events until the reaper is done
    pub async fn supervise(&mut self, control: &mut ControlChannel) -> Result<u32, LifecycleError> {
        let mut reaper = self.start_reaper();

        if let Err(e) = self.spawn_initial() {
            self.stop_reaper(reaper).await;
            return Err(e);
        }

        let failure = loop {
            tokio::select! {
                joined = &mut reaper => return Ok(joined??),
                event = control.recv() => match event {
                    ControlEvent::Recruit => match self.recruit() {
                        Ok(()) => {}
                        Err(e @ LifecycleError::Spawn { .. }) => {
                            warn!("Recruiting failed, run continues: {}", e);
                        }
                        Err(e) => break e,
                    },
                    ControlEvent::Fatal(signal) => break LifecycleError::Interrupted(signal),
                },
            }
        };

        self.stop_reaper(reaper).await;
        Err(failure)
    }

    /// Add a random batch of `1..=NE` elves, unless the workshop has closed.
    ///
    /// On a spawn failure the ids that got no process are withdrawn before
    /// the error is returned, so the reaper never waits for them.
    pub fn recruit(&mut self) -> Result<(), LifecycleError> {
        let roster = *self.region.roster();
        let batch = rand::thread_rng().gen_range(1..=roster.elves);

        let ids = match self.region.reserve_elves(batch)? {
            Some(ids) => ids,
            None => {
                info!("Workshop is closed, no elves recruited");
                return Ok(());
            }
        };

        for id in ids.clone() {
            if let Err(e) = self.spawn(ActorLabel::Elf(id)) {
                let unspawned = ids.end() - id + 1;
                let population = self.region.withdraw_elves(unspawned)?;
                warn!(
                    "Recruiting stopped at Elf {}; population corrected to {}",
                    id, population
                );
                return Err(e);
            }
        }

        info!("Recruited {} elves ({:?})", batch, ids);
        Ok(())
    }

    /// Unblock and join the reaper so it drops its region reference
    async fn stop_reaper(&self, reaper: JoinHandle<Result<u32, IpcError>>) {
        self.abort.store(true, Ordering::Release);
        if let Err(e) = self.region.signal_child_finished() {
            error!("Failed to wake the reaper: {}", e);
        }
        match reaper.await {
            Ok(Ok(finished)) => debug!("Reaper stopped after {} finishers", finished),
            Ok(Err(e)) => warn!("Reaper ended with an error: {}", e),
            Err(e) => warn!("Reaper task failed: {}", e),
        }
    }

    async fn kill_children(&mut self) {
        for handle in &mut self.children {
            handle.kill();
        }
        for handle in &mut self.children {
            if let Err(e) = handle.wait().await {
                warn!("Failed to wait for {}: {}", handle.label(), e);
            }
        }
    }

    /// Wait for every child and return the first failure, if any
    async fn collect_children(&mut self) -> Result<(), LifecycleError> {
        let mut first_failure = None;
        for handle in &mut self.children {
            let label = handle.label();
            let failure = match handle.wait().await {
                Ok(status) if status.success() => continue,
                Ok(status) => LifecycleError::ActorFailed { label, status },
                Err(source) => LifecycleError::Wait { label, source },
            };
            error!("{}", failure);
            first_failure.get_or_insert(failure);
        }
        first_failure.map_or(Ok(()), Err)
    }

    fn teardown(self) -> Result<(), LifecycleError> {
        let region = Arc::try_unwrap(self.region).map_err(|_| LifecycleError::RegionInUse)?;
        // Every actor has exited and the reaper has been joined.
        unsafe { region.teardown() }?;
        debug!("Shared resources released");
        Ok(())
    }

    /// Normal end: wait for children and tear down. Failure: kill children,
    /// tear down, report the original failure.
    pub async fn finish(mut self, outcome: Result<u32, LifecycleError>) -> Result<u32, LifecycleError> {
        match outcome {
            Ok(finished) => {
                let collected = self.collect_children().await;
                let peak = self.region.peak_elves_waiting();
                let released = self.teardown();
                collected?;
                released?;
                info!(
                    "Christmas started; {} actors finished, at most {} elves waited at once",
                    finished, peak?
                );
                Ok(finished)
            }
            Err(failure) => {
                error!("Aborting run: {}", failure);
                self.kill_children().await;
                if let Err(e) = self.teardown() {
                    error!("Teardown after abort failed: {}", e);
                }
                Err(failure)
            }
        }
    }
}

/// Count `child_finished` permits until every expected actor has finished.
///
/// Setting `abort` and posting one extra permit makes the reaper return early.
fn reap(workshop: &Workshop, abort: &AtomicBool) -> Result<u32, IpcError> {
    let mut finished = 0;
    while finished < workshop.expected_finishers()? {
        workshop.await_child_finished()?;
        if abort.load(Ordering::Acquire) {
            break;
        }
        finished += 1;
        debug!("{} actor(s) finished", finished);
    }
    Ok(finished)
}
