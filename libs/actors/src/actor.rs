//! Actor Behaviour
//!
//! Each actor is a blocking control loop over the shared [`Workshop`]. The
//! same loop runs inside a dedicated process in production and inside a
//! thread in tests.

use crate::elf::Elf;
use crate::error::Result;
use crate::journal::{ActorKind, ActorLabel, Journal};
use crate::reindeer::Reindeer;
use crate::santa::Santa;
use crate::workshop::Workshop;
use rand::Rng;
use std::ops::RangeInclusive;
use std::thread;
use std::time::Duration;
use tracing::info;

pub trait Actor {
    /// What the run reports once the actor has announced `child_finished`
    type Outcome;

    fn label(&self) -> ActorLabel;

    /// Run to completion, ending with one `child_finished` release
    fn run(&mut self, workshop: &Workshop, journal: &mut Journal<'_>) -> Result<Self::Outcome>;
}

/// Build the actor of the given kind and run it to completion
pub fn run_role(
    kind: ActorKind,
    id: u32,
    workshop: &Workshop,
    journal: &mut Journal<'_>,
) -> Result<()> {
    match kind {
        ActorKind::Santa => {
            Santa::new(workshop).run(workshop, journal)?;
        }
        ActorKind::Elf => {
            let outcome = Elf::new(id, workshop).run(workshop, journal)?;
            info!("Elf {} finished: {:?}", id, outcome);
        }
        ActorKind::Reindeer => {
            Reindeer::new(id, workshop).run(workshop, journal)?;
            info!("RD {} hitched", id);
        }
    }
    Ok(())
}

/// Sleep for a uniformly drawn number of milliseconds
pub(crate) fn sleep_within(range_ms: RangeInclusive<u32>) {
    let millis = rand::thread_rng().gen_range(range_ms);
    if millis > 0 {
        thread::sleep(Duration::from_millis(u64::from(millis)));
    }
}
