//! Reindeer
//!
//! One vacation, one return, one hitch. The last reindeer home wakes Santa.

use crate::actor::{sleep_within, Actor};
use crate::error::Result;
use crate::journal::{ActorLabel, Journal};
use crate::workshop::Workshop;
use tracing::debug;
use workshop_config::journal::{GET_HITCHED, RETURN_HOME, STARTED};

#[derive(Debug)]
pub struct Reindeer {
    id: u32,
    herd: u32,
    max_vacation_ms: u32,
}

impl Reindeer {
    pub fn new(id: u32, workshop: &Workshop) -> Self {
        let roster = workshop.roster();
        Self {
            id,
            herd: roster.reindeer,
            max_vacation_ms: roster.reindeer_vacation_ms,
        }
    }

    fn return_home(&self, workshop: &Workshop) -> Result<()> {
        let mut ready = workshop.reindeer_ready.lock()?;
        *ready += 1;
        if *ready == self.herd {
            let _desk = workshop.santa_ready.lock()?;
            workshop.wake_for_hitch.release()?;
            workshop.santa_wakeup.release()?;
            debug!("RD {} is the last one home", self.id);
        }
        Ok(())
    }
}

impl Actor for Reindeer {
    type Outcome = ();

    fn label(&self) -> ActorLabel {
        ActorLabel::Reindeer(self.id)
    }

    fn run(&mut self, workshop: &Workshop, journal: &mut Journal<'_>) -> Result<()> {
        journal.record(self.label(), STARTED)?;
        sleep_within(self.max_vacation_ms / 2..=self.max_vacation_ms);

        journal.record(self.label(), RETURN_HOME)?;
        self.return_home(workshop)?;

        workshop.wait_for_hitch.acquire()?;
        journal.record(self.label(), GET_HITCHED)?;
        workshop.reindeer_hitched.release()?;

        workshop.signal_child_finished()?;
        Ok(())
    }
}
