//! Workshop Shared Block
//!
//! The one `#[repr(C)]` value every actor process maps: the run roster, the
//! named semaphores of the rendezvous protocol, the guarded counters and the
//! two one-shot flags.
//!
//! ```text
//! ┌─────────────────────────── Workshop ───────────────────────────┐
//! │ Roster { ne, nr, te, tr, dynamic }            (read-only)      │
//! │ wait_in_queue(3) wait_for_help elf_helped wake_for_help        │
//! │ wait_for_hitch reindeer_hitched wake_for_hitch santa_wakeup    │
//! │ elf_on_holiday child_finished                                  │
//! │ santa_ready<()> elf_queue<ElfQueue> reindeer_ready<u32>        │
//! │ action_log<u32> elf_population<u32>              (Guarded)     │
//! │ shop_closed christmas_started                    (OnceFlag)    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lock order, where two are held at once: `reindeer_count_mutex` before
//! `santa_ready`; `santa_ready` before `journal_mutex`.
//!
//! `shop_closed` is raised under `elves_stable`. Reserving and withdrawing
//! elves take the same lock, so each of them sees the population either
//! entirely before closing or entirely after it.

use ipc::{Guarded, GuardedRef, IpcError, OnceFlag, Primitive, Semaphore, SharedLayout};
use std::ops::RangeInclusive;
use std::ptr::addr_of_mut;
use tracing::debug;
use workshop_config::{SimulationConfig, ADMISSION_PERMITS};

/// Names of the primitives, as reported in errors and diagnostics
pub mod names {
    pub const WAIT_IN_QUEUE: &str = "wait_in_queue";
    pub const WAIT_FOR_HELP: &str = "wait_for_help";
    pub const ELF_HELPED: &str = "elf_helped";
    pub const WAKE_FOR_HELP: &str = "wake_for_help";
    pub const WAIT_FOR_HITCH: &str = "wait_for_hitch";
    pub const REINDEER_HITCHED: &str = "reindeer_hitched";
    pub const WAKE_FOR_HITCH: &str = "wake_for_hitch";
    pub const SANTA_WAKEUP: &str = "santa_wakeup";
    pub const ELF_ON_HOLIDAY: &str = "elf_on_holiday";
    pub const CHILD_FINISHED: &str = "child_finished";
    pub const SANTA_READY: &str = "santa_ready";
    pub const ELF_QUEUE_MUTEX: &str = "elf_queue_mutex";
    pub const REINDEER_COUNT_MUTEX: &str = "reindeer_count_mutex";
    pub const JOURNAL_MUTEX: &str = "journal_mutex";
    pub const ELVES_STABLE: &str = "elves_stable";
}

const PRIMITIVE_COUNT: usize = 15;

/// Run parameters as stored in the shared block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roster {
    pub elves: u32,
    pub reindeer: u32,
    pub elf_work_ms: u32,
    pub reindeer_vacation_ms: u32,
    pub dynamic_elves: bool,
}

impl From<SimulationConfig> for Roster {
    fn from(config: SimulationConfig) -> Self {
        Self {
            elves: config.elves,
            reindeer: config.reindeer,
            elf_work_ms: config.elf_work_ms,
            reindeer_vacation_ms: config.reindeer_vacation_ms,
            dynamic_elves: config.dynamic_elves,
        }
    }
}

impl From<Roster> for SimulationConfig {
    fn from(roster: Roster) -> Self {
        SimulationConfig::new(
            roster.elves,
            roster.reindeer,
            roster.elf_work_ms,
            roster.reindeer_vacation_ms,
        )
        .with_dynamic_elves(roster.dynamic_elves)
    }
}

/// Elves between admission and Santa's help
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElfQueue {
    /// Admitted elves still waiting for help
    pub waiting: u32,
    /// Most elves ever waiting at once
    pub peak: u32,
}

impl ElfQueue {
    pub(crate) fn admit(&mut self) -> u32 {
        self.waiting += 1;
        self.peak = self.peak.max(self.waiting);
        self.waiting
    }

    pub(crate) fn leave(&mut self) -> u32 {
        self.waiting = self.waiting.saturating_sub(1);
        self.waiting
    }
}

/// Shared state of one simulation run
#[repr(C)]
pub struct Workshop {
    roster: Roster,

    pub(crate) wait_in_queue: Semaphore,
    pub(crate) wait_for_help: Semaphore,
    pub(crate) elf_helped: Semaphore,
    pub(crate) wake_for_help: Semaphore,
    pub(crate) wait_for_hitch: Semaphore,
    pub(crate) reindeer_hitched: Semaphore,
    pub(crate) wake_for_hitch: Semaphore,
    pub(crate) santa_wakeup: Semaphore,
    elf_on_holiday: Semaphore,
    child_finished: Semaphore,

    pub(crate) santa_ready: Guarded<()>,
    pub(crate) elf_queue: Guarded<ElfQueue>,
    pub(crate) reindeer_ready: Guarded<u32>,
    pub(crate) action_log: Guarded<u32>,
    elf_population: Guarded<u32>,

    pub(crate) shop_closed: OnceFlag,
    christmas_started: OnceFlag,
}

unsafe impl SharedLayout for Workshop {
    // "SANTA" + layout revision
    const MAGIC: u64 = 0x5341_4e54_4100_0003;
    type Init = Roster;

    unsafe fn init_in_place(this: *mut Self, roster: Roster) -> ipc::Result<()> {
        addr_of_mut!((*this).roster).write(roster);
        let workshop = &*this;

        let mut opened: Vec<&dyn Primitive> = Vec::with_capacity(PRIMITIVE_COUNT);
        if let Err(e) = workshop.open_primitives(&mut opened) {
            for primitive in opened.iter().rev() {
                if let Err(rollback) = primitive.destroy() {
                    debug!("Rollback of {} failed: {}", primitive.name(), rollback);
                }
            }
            return Err(e);
        }

        Ok(())
    }

    unsafe fn destroy_in_place(&self) -> Vec<IpcError> {
        self.primitives()
            .iter()
            .filter_map(|primitive| primitive.destroy().err())
            .collect()
    }
}

impl Workshop {
    /// Initialize primitives in declaration order, recording each success
    unsafe fn open_primitives<'a>(&'a self, opened: &mut Vec<&'a dyn Primitive>) -> ipc::Result<()> {
        let semaphores: [(&Semaphore, &str, u32); 10] = [
            (&self.wait_in_queue, names::WAIT_IN_QUEUE, ADMISSION_PERMITS),
            (&self.wait_for_help, names::WAIT_FOR_HELP, 0),
            (&self.elf_helped, names::ELF_HELPED, 0),
            (&self.wake_for_help, names::WAKE_FOR_HELP, 0),
            (&self.wait_for_hitch, names::WAIT_FOR_HITCH, 0),
            (&self.reindeer_hitched, names::REINDEER_HITCHED, 0),
            (&self.wake_for_hitch, names::WAKE_FOR_HITCH, 0),
            (&self.santa_wakeup, names::SANTA_WAKEUP, 0),
            (&self.elf_on_holiday, names::ELF_ON_HOLIDAY, 0),
            (&self.child_finished, names::CHILD_FINISHED, 0),
        ];
        for (semaphore, name, permits) in semaphores {
            semaphore.init(name, permits)?;
            opened.push(semaphore);
        }

        self.santa_ready.init(names::SANTA_READY, ())?;
        opened.push(&self.santa_ready);

        self.elf_queue.init(names::ELF_QUEUE_MUTEX, ElfQueue::default())?;
        opened.push(&self.elf_queue);

        // The initial elves are known before any actor exists.
        let counters: [(&Guarded<u32>, &str, u32); 3] = [
            (&self.reindeer_ready, names::REINDEER_COUNT_MUTEX, 0),
            (&self.action_log, names::JOURNAL_MUTEX, 0),
            (&self.elf_population, names::ELVES_STABLE, self.roster.elves),
        ];
        for (counter, name, value) in counters {
            counter.init(name, value)?;
            opened.push(counter);
        }

        Ok(())
    }

    fn primitives(&self) -> [&dyn Primitive; PRIMITIVE_COUNT] {
        [
            &self.wait_in_queue,
            &self.wait_for_help,
            &self.elf_helped,
            &self.wake_for_help,
            &self.wait_for_hitch,
            &self.reindeer_hitched,
            &self.wake_for_hitch,
            &self.santa_wakeup,
            &self.elf_on_holiday,
            &self.child_finished,
            &self.santa_ready,
            &self.elf_queue,
            &self.reindeer_ready,
            &self.action_log,
            &self.elf_population,
        ]
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn is_shop_closed(&self) -> bool {
        self.shop_closed.is_raised()
    }

    pub fn is_christmas_started(&self) -> bool {
        self.christmas_started.is_raised()
    }

    pub(crate) fn start_christmas(&self) -> bool {
        self.christmas_started.raise()
    }

    /// Announce that one actor has finished its run
    pub fn signal_child_finished(&self) -> ipc::Result<()> {
        self.child_finished.release()
    }

    /// Block until some actor announces it has finished
    pub fn await_child_finished(&self) -> ipc::Result<()> {
        self.child_finished.acquire()
    }

    /// Announce that one elf has logged its last line
    pub(crate) fn elf_left_for_holiday(&self) -> ipc::Result<()> {
        self.elf_on_holiday.release()
    }

    /// Block until `count` elves have left for their holidays
    pub(crate) fn await_elves_on_holiday(&self, count: u32) -> ipc::Result<()> {
        (0..count).try_for_each(|_| self.elf_on_holiday.acquire())
    }

    /// Close the shop and return the elf population at that instant.
    ///
    /// The flag is raised under `elves_stable`, so no reservation or
    /// withdrawal can slip between the flag and the returned count.
    pub(crate) fn close_shop(&self) -> ipc::Result<GuardedRef<'_, u32>> {
        let population = self.elf_population.lock()?;
        self.shop_closed.raise();
        Ok(population)
    }

    /// Most elves admitted past `wait_in_queue` and waiting for help at once
    pub fn peak_elves_waiting(&self) -> ipc::Result<u32> {
        Ok(self.elf_queue.lock()?.peak)
    }

    /// Current number of elves admitted to the run
    pub fn elf_population(&self) -> ipc::Result<u32> {
        Ok(*self.elf_population.lock()?)
    }

    /// Number of actors that must finish before the run is over
    pub fn expected_finishers(&self) -> ipc::Result<u32> {
        let population = *self.elf_population.lock()?;
        Ok(1 + self.roster.reindeer + population)
    }

    /// Reserve ids for `count` more elves.
    ///
    /// Returns `None` once the shop is closed: closing has already handed out
    /// one release per known elf, so a late elf would never be let through.
    pub fn reserve_elves(&self, count: u32) -> ipc::Result<Option<RangeInclusive<u32>>> {
        let mut population = self.elf_population.lock()?;
        if count == 0 || self.shop_closed.is_raised() {
            return Ok(None);
        }
        let first = *population + 1;
        *population += count;
        Ok(Some(first..=*population))
    }

    /// Give back reserved ids that never got a process.
    ///
    /// Once the shop is closed Santa waits for every elf he counted at
    /// closing, so each withdrawn id then stands in for its missing elf.
    pub fn withdraw_elves(&self, count: u32) -> ipc::Result<u32> {
        let mut population = self.elf_population.lock()?;
        let withdrawn = count.min(*population);
        *population -= withdrawn;
        if self.shop_closed.is_raised() {
            self.elf_on_holiday.release_many(withdrawn)?;
        }
        Ok(*population)
    }

    /// Lines written to the action log so far
    pub fn actions_recorded(&self) -> ipc::Result<u32> {
        Ok(*self.action_log.lock()?)
    }

}

impl std::fmt::Debug for Workshop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workshop")
            .field("roster", &self.roster)
            .field("shop_closed", &self.shop_closed.is_raised())
            .field("christmas_started", &self.christmas_started.is_raised())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipc::SharedRegion;
    use tempfile::tempdir;

    fn roster(elves: u32, reindeer: u32) -> Roster {
        Roster::from(SimulationConfig::new(elves, reindeer, 0, 0))
    }

    #[test]
    fn test_initial_permits() {
        let dir = tempdir().unwrap();
        let region = SharedRegion::<Workshop>::create(dir.path().join("w.shm"), roster(5, 2)).unwrap();

        assert_eq!(region.wait_in_queue.permits().unwrap(), ADMISSION_PERMITS as i32);
        assert_eq!(region.santa_wakeup.permits().unwrap(), 0);
        assert_eq!(region.child_finished.permits().unwrap(), 0);
        assert_eq!(region.elf_population().unwrap(), 5);
        assert_eq!(region.expected_finishers().unwrap(), 1 + 2 + 5);
        assert_eq!(region.actions_recorded().unwrap(), 0);
        assert_eq!(region.peak_elves_waiting().unwrap(), 0);
        assert!(!region.is_shop_closed());

        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_primitive_names_fit_inline_buffer() {
        let dir = tempdir().unwrap();
        let region = SharedRegion::<Workshop>::create(dir.path().join("w.shm"), roster(1, 1)).unwrap();

        let names: Vec<&str> = region.primitives().iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), PRIMITIVE_COUNT);
        assert!(names.contains(&names::ELVES_STABLE));
        assert!(names.contains(&names::SANTA_WAKEUP));

        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_reserve_elves_extends_population() {
        let dir = tempdir().unwrap();
        let region = SharedRegion::<Workshop>::create(dir.path().join("w.shm"), roster(3, 1)).unwrap();

        assert_eq!(region.reserve_elves(2).unwrap(), Some(4..=5));
        assert_eq!(region.reserve_elves(1).unwrap(), Some(6..=6));
        assert_eq!(region.reserve_elves(0).unwrap(), None);
        assert_eq!(region.expected_finishers().unwrap(), 1 + 1 + 6);

        assert_eq!(region.withdraw_elves(1).unwrap(), 5);

        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_no_reservation_after_closing() {
        let dir = tempdir().unwrap();
        let region = SharedRegion::<Workshop>::create(dir.path().join("w.shm"), roster(3, 1)).unwrap();

        assert!(region.shop_closed.raise());
        assert_eq!(region.reserve_elves(4).unwrap(), None);
        assert_eq!(region.elf_population().unwrap(), 3);

        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_withdrawal_stands_in_only_after_closing() {
        let dir = tempdir().unwrap();
        let region = SharedRegion::<Workshop>::create(dir.path().join("w.shm"), roster(3, 1)).unwrap();

        region.reserve_elves(3).unwrap();
        region.withdraw_elves(1).unwrap();
        assert_eq!(region.elf_on_holiday.permits().unwrap(), 0);

        assert_eq!(*region.close_shop().unwrap(), 5);
        assert_eq!(region.withdraw_elves(2).unwrap(), 3);
        assert_eq!(region.elf_on_holiday.permits().unwrap(), 2);

        // Never more stand-ins than elves
        assert_eq!(region.withdraw_elves(10).unwrap(), 0);
        assert_eq!(region.elf_on_holiday.permits().unwrap(), 5);

        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_elf_queue_remembers_peak() {
        let mut queue = ElfQueue::default();
        assert_eq!(queue.admit(), 1);
        assert_eq!(queue.admit(), 2);
        assert_eq!(queue.leave(), 1);
        assert_eq!(queue.admit(), 2);
        assert_eq!(queue.leave(), 1);
        assert_eq!(queue.leave(), 0);
        assert_eq!(queue.leave(), 0);
        assert_eq!(queue, ElfQueue { waiting: 0, peak: 2 });
    }

    #[test]
    fn test_roster_round_trips_through_config() {
        let config = SimulationConfig::new(7, 4, 20, 30).with_dynamic_elves(true);
        assert_eq!(SimulationConfig::from(Roster::from(config)), config);
    }
}
