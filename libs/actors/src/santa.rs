//! Santa
//!
//! Sleeps on `santa_wakeup` and, for each permit, inspects both wake signals
//! under `santa_ready`. The reindeer signal is checked first: once every
//! reindeer is home the workshop closes even if three elves are waiting.
//!
//! ## Closing
//!
//! ```text
//! closing workshop ─► shop_closed ─► release every elf (P permits on
//! wait_in_queue and wait_for_help) ─► hitch RD 1..=R one at a time ─►
//! P x elf_on_holiday ─► Christmas started ─► christmas_started ─►
//! child_finished
//! ```

use crate::actor::Actor;
use crate::error::Result;
use crate::journal::{ActorLabel, Journal};
use crate::workshop::Workshop;
use tracing::{debug, info};
use workshop_config::journal::{
    CHRISTMAS_STARTED, CLOSING_WORKSHOP, GOING_TO_SLEEP, HELPING_ELVES,
};
use workshop_config::ELF_BATCH_SIZE;

/// What one wake-up turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// Every reindeer is home
    Close,
    /// A batch of elves was helped
    HelpedElves,
    /// Neither signal was pending
    Spurious,
}

/// Summary of Santa's run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SantaReport {
    /// Number of elf batches helped before closing
    pub help_rounds: u32,
    /// Elves still known to the workshop when it closed
    pub elves_at_closing: u32,
}

#[derive(Debug)]
pub struct Santa {
    herd: u32,
}

impl Santa {
    pub fn new(workshop: &Workshop) -> Self {
        Self {
            herd: workshop.roster().reindeer,
        }
    }

    /// Handle one `santa_wakeup` permit
    pub(crate) fn serve_wakeup(
        &mut self,
        workshop: &Workshop,
        journal: &mut Journal<'_>,
    ) -> Result<Wakeup> {
        let _desk = workshop.santa_ready.lock()?;

        if workshop.wake_for_hitch.try_acquire()? {
            return Ok(Wakeup::Close);
        }

        if workshop.wake_for_help.try_acquire()? {
            journal.record(self.label(), HELPING_ELVES)?;
            for _ in 0..ELF_BATCH_SIZE {
                workshop.wait_for_help.release()?;
                workshop.elf_helped.acquire()?;
            }
            journal.record(self.label(), GOING_TO_SLEEP)?;
            return Ok(Wakeup::HelpedElves);
        }

        Ok(Wakeup::Spurious)
    }

    fn close_workshop(&mut self, workshop: &Workshop, journal: &mut Journal<'_>) -> Result<u32> {
        journal.record(self.label(), CLOSING_WORKSHOP)?;

        let released = {
            let population = workshop.close_shop()?;
            workshop.wait_in_queue.release_many(*population)?;
            workshop.wait_for_help.release_many(*population)?;
            *population
        };
        debug!("Released {} elves for the holidays", released);

        for _ in 0..self.herd {
            workshop.wait_for_hitch.release()?;
            workshop.reindeer_hitched.acquire()?;
        }

        // Christmas is the last line: every elf counted at closing has
        // logged its holidays, or was withdrawn before it ever ran.
        workshop.await_elves_on_holiday(released)?;
        journal.record(self.label(), CHRISTMAS_STARTED)?;
        workshop.start_christmas();
        Ok(released)
    }
}

impl Actor for Santa {
    type Outcome = SantaReport;

    fn label(&self) -> ActorLabel {
        ActorLabel::Santa
    }

    fn run(&mut self, workshop: &Workshop, journal: &mut Journal<'_>) -> Result<SantaReport> {
        journal.record(self.label(), GOING_TO_SLEEP)?;

        let mut report = SantaReport::default();
        loop {
            workshop.santa_wakeup.acquire()?;
            match self.serve_wakeup(workshop, journal)? {
                Wakeup::Close => break,
                Wakeup::HelpedElves => report.help_rounds += 1,
                Wakeup::Spurious => debug!("Santa woke up with nothing to do"),
            }
        }

        report.elves_at_closing = self.close_workshop(workshop, journal)?;
        workshop.signal_child_finished()?;

        info!(
            "Christmas started after {} help round(s), {} elves on holiday",
            report.help_rounds, report.elves_at_closing
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workshop::Roster;
    use ipc::SharedRegion;
    use std::fs::{self, File};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use workshop_config::journal::TAKING_HOLIDAYS;
    use workshop_config::SimulationConfig;

    fn workshop(dir: &TempDir) -> (SharedRegion<Workshop>, std::path::PathBuf) {
        let log_path = dir.path().join("actions.out");
        File::create(&log_path).unwrap();
        let region = SharedRegion::<Workshop>::create(
            dir.path().join("w.shm"),
            Roster::from(SimulationConfig::new(3, 2, 0, 0)),
        )
        .unwrap();
        (region, log_path)
    }

    #[test]
    fn test_closing_wins_over_waiting_elves() {
        let dir = tempdir().unwrap();
        let (region, log_path) = workshop(&dir);
        {
            let mut journal = Journal::open(&region, &log_path).unwrap();
            region.wake_for_help.release().unwrap();
            region.wake_for_hitch.release().unwrap();

            let mut santa = Santa::new(&region);
            assert_eq!(santa.serve_wakeup(&region, &mut journal).unwrap(), Wakeup::Close);

            // The elves' signal is left for nobody; no helping was logged.
            assert_eq!(region.wake_for_help.permits().unwrap(), 1);
            assert!(fs::read_to_string(&log_path).unwrap().is_empty());
        }
        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_help_round_releases_one_batch() {
        let dir = tempdir().unwrap();
        let (region, log_path) = workshop(&dir);
        {
            let mut journal = Journal::open(&region, &log_path).unwrap();
            region.wake_for_help.release().unwrap();
            region.elf_helped.release_many(ELF_BATCH_SIZE).unwrap();

            let mut santa = Santa::new(&region);
            assert_eq!(
                santa.serve_wakeup(&region, &mut journal).unwrap(),
                Wakeup::HelpedElves
            );

            assert_eq!(region.wait_for_help.permits().unwrap(), ELF_BATCH_SIZE as i32);
            assert_eq!(region.elf_helped.permits().unwrap(), 0);
            assert_eq!(
                fs::read_to_string(&log_path).unwrap(),
                "1: Santa: helping elves\n2: Santa: going to sleep\n"
            );
        }
        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_spurious_wakeup() {
        let dir = tempdir().unwrap();
        let (region, log_path) = workshop(&dir);
        {
            let mut journal = Journal::open(&region, &log_path).unwrap();
            let mut santa = Santa::new(&region);
            assert_eq!(
                santa.serve_wakeup(&region, &mut journal).unwrap(),
                Wakeup::Spurious
            );
        }
        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_closing_releases_every_known_elf() {
        let dir = tempdir().unwrap();
        let (region, log_path) = workshop(&dir);
        {
            let mut journal = Journal::open(&region, &log_path).unwrap();
            region.reindeer_hitched.release_many(2).unwrap();
            for _ in 0..3 {
                region.elf_left_for_holiday().unwrap();
            }

            let mut santa = Santa::new(&region);
            assert_eq!(santa.close_workshop(&region, &mut journal).unwrap(), 3);

            assert!(region.is_shop_closed());
            assert!(region.is_christmas_started());
            assert_eq!(region.wait_in_queue.permits().unwrap(), 3 + 3);
            assert_eq!(region.wait_for_help.permits().unwrap(), 3);
            assert_eq!(region.wait_for_hitch.permits().unwrap(), 2);
            assert_eq!(
                fs::read_to_string(&log_path).unwrap(),
                "1: Santa: closing workshop\n2: Santa: Christmas started\n"
            );
        }
        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_christmas_waits_for_every_elf() {
        let dir = tempdir().unwrap();
        let (region, log_path) = workshop(&dir);
        let christmas = AtomicBool::new(false);

        thread::scope(|s| {
            let santa = s.spawn(|| {
                let mut journal = Journal::open(&region, &log_path).unwrap();
                let released = Santa::new(&region)
                    .close_workshop(&region, &mut journal)
                    .unwrap();
                christmas.store(true, Ordering::Release);
                released
            });

            region.reindeer_hitched.release_many(2).unwrap();
            region.elf_left_for_holiday().unwrap();
            region.elf_left_for_holiday().unwrap();
            thread::sleep(Duration::from_millis(50));
            assert!(!christmas.load(Ordering::Acquire), "one elf is still at work");

            let mut journal = Journal::open(&region, &log_path).unwrap();
            journal.record(ActorLabel::Elf(3), TAKING_HOLIDAYS).unwrap();
            region.elf_left_for_holiday().unwrap();
            assert_eq!(santa.join().unwrap(), 3);
        });

        let log = fs::read_to_string(&log_path).unwrap();
        assert!(log.ends_with("Elf 3: taking holidays\n3: Santa: Christmas started\n"));
        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_withdrawn_recruits_do_not_hold_up_christmas() {
        let dir = tempdir().unwrap();
        let (region, log_path) = workshop(&dir);
        assert_eq!(region.reserve_elves(2).unwrap(), Some(4..=5));

        thread::scope(|s| {
            let santa = s.spawn(|| {
                let mut journal = Journal::open(&region, &log_path).unwrap();
                Santa::new(&region).close_workshop(&region, &mut journal).unwrap()
            });

            region.reindeer_hitched.release_many(2).unwrap();
            for _ in 0..3 {
                region.elf_left_for_holiday().unwrap();
            }
            while !region.is_shop_closed() {
                thread::sleep(Duration::from_millis(1));
            }
            // Santa counted five elves; the two recruits never got a process.
            assert_eq!(region.withdraw_elves(2).unwrap(), 3);
            assert_eq!(santa.join().unwrap(), 5);
        });

        assert!(region.is_christmas_started());
        unsafe { region.teardown().unwrap() };
    }
}
