//! Fixed rules of the workshop protocol
//!
//! These are business rules of the simulated scenario, not tunables. The
//! run parameters that do vary live in [`crate::SimulationConfig`].

/// Number of elves Santa helps per wake-up, and the size of the admission
/// window in front of his door.
pub const ELF_BATCH_SIZE: u32 = 3;

/// Initial permits of the admission semaphore (`wait_in_queue`).
pub const ADMISSION_PERMITS: u32 = ELF_BATCH_SIZE;

/// Inclusive bounds accepted for each run parameter.
pub mod limits {
    use std::ops::RangeInclusive;

    /// Elf count `NE`
    pub const ELVES: RangeInclusive<u32> = 1..=999;

    /// Reindeer count `NR`
    pub const REINDEER: RangeInclusive<u32> = 1..=19;

    /// Maximum elf work time `TE` (milliseconds)
    pub const ELF_WORK_MS: RangeInclusive<u32> = 0..=1000;

    /// Maximum reindeer vacation time `TR` (milliseconds)
    pub const REINDEER_VACATION_MS: RangeInclusive<u32> = 0..=1000;
}

/// Labels and messages written to the ordered action log.
pub mod journal {
    pub const SANTA_LABEL: &str = "Santa";
    pub const ELF_LABEL: &str = "Elf";
    pub const REINDEER_LABEL: &str = "RD";

    pub const STARTED: &str = "started";
    pub const NEED_HELP: &str = "need help";
    pub const GET_HELP: &str = "get help";
    pub const TAKING_HOLIDAYS: &str = "taking holidays";

    pub const RETURN_HOME: &str = "return home";
    pub const GET_HITCHED: &str = "get hitched";

    pub const GOING_TO_SLEEP: &str = "going to sleep";
    pub const HELPING_ELVES: &str = "helping elves";
    pub const CLOSING_WORKSHOP: &str = "closing workshop";
    pub const CHRISTMAS_STARTED: &str = "Christmas started";
}
