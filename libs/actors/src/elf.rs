//! Elf
//!
//! ```text
//! Working ─► Queuing ─► Admitted ─► AwaitingHelp ─► Helped ─┐
//!    │          │           │              │                ▼
//!    └──────────┴───────────┴──── shop closed ──────────► Leaving
//! ```
//!
//! At most three elves are admitted past `wait_in_queue`; the third one wakes
//! Santa. The last elf of a batch to leave Santa reopens the admission window.

use crate::actor::{sleep_within, Actor};
use crate::error::Result;
use crate::journal::{ActorLabel, Journal};
use crate::workshop::Workshop;
use tracing::debug;
use workshop_config::journal::{GET_HELP, NEED_HELP, STARTED, TAKING_HOLIDAYS};
use workshop_config::{ADMISSION_PERMITS, ELF_BATCH_SIZE};

/// How an elf's request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfOutcome {
    Helped,
    /// The workshop closed before Santa got to this elf
    SentOnHoliday,
}

#[derive(Debug)]
pub struct Elf {
    id: u32,
    max_work_ms: u32,
}

impl Elf {
    pub fn new(id: u32, workshop: &Workshop) -> Self {
        Self {
            id,
            max_work_ms: workshop.roster().elf_work_ms,
        }
    }

    fn request_help(&self, workshop: &Workshop, journal: &mut Journal<'_>) -> Result<ElfOutcome> {
        if workshop.shop_closed.is_raised() {
            return Ok(ElfOutcome::SentOnHoliday);
        }
        journal.record(self.label(), NEED_HELP)?;

        workshop.wait_in_queue.acquire()?;
        if workshop.shop_closed.is_raised() {
            debug!("Elf {} let through by closing", self.id);
            return Ok(ElfOutcome::SentOnHoliday);
        }

        {
            let mut queue = workshop.elf_queue.lock()?;
            if queue.admit() == ELF_BATCH_SIZE {
                workshop.wake_for_help.release()?;
                workshop.santa_wakeup.release()?;
            }
        }

        workshop.wait_for_help.acquire()?;
        let remaining = workshop.elf_queue.lock()?.leave();

        if workshop.shop_closed.is_raised() {
            return Ok(ElfOutcome::SentOnHoliday);
        }

        journal.record(self.label(), GET_HELP)?;
        workshop.elf_helped.release()?;
        if remaining == 0 {
            workshop.wait_in_queue.release_many(ADMISSION_PERMITS)?;
        }

        Ok(ElfOutcome::Helped)
    }
}

impl Actor for Elf {
    type Outcome = ElfOutcome;

    fn label(&self) -> ActorLabel {
        ActorLabel::Elf(self.id)
    }

    fn run(&mut self, workshop: &Workshop, journal: &mut Journal<'_>) -> Result<ElfOutcome> {
        journal.record(self.label(), STARTED)?;
        sleep_within(0..=self.max_work_ms);

        let outcome = self.request_help(workshop, journal)?;

        journal.record(self.label(), TAKING_HOLIDAYS)?;
        workshop.elf_left_for_holiday()?;
        workshop.signal_child_finished()?;

        debug!("Elf {} done: {:?}", self.id, outcome);
        Ok(outcome)
    }
}
