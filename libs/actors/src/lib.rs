//! Workshop Actors
//!
//! Control loops of Santa, the elves and the reindeer, running against the
//! shared [`Workshop`] block. Each loop is plain blocking code: the service
//! runs one per process, tests run one per thread.
//!
//! # Architecture
//!
//! ```text
//!   Elf 1..=NE ──need help──► wait_in_queue(3) ──3rd──► wake_for_help ─┐
//!                                                                      ├─► santa_wakeup ─► Santa
//!   RD 1..=NR ──return home──► reindeer_count == NR ──► wake_for_hitch ─┘        │
//!                                                                                ▼
//!                                        helping elves (x3) | closing workshop ─► Christmas started
//!
//!   every actor ──► Journal (journal_mutex) ──► "<n>: <Label>: <message>"
//!   every actor ──► child_finished ──► Lifecycle Manager
//! ```

pub mod actor;
pub mod elf;
pub mod error;
pub mod journal;
pub mod reindeer;
pub mod santa;
pub mod workshop;

pub use actor::{run_role, Actor};
pub use elf::{Elf, ElfOutcome};
pub use error::{ActorError, Result};
pub use journal::{ActorKind, ActorLabel, Journal};
pub use reindeer::Reindeer;
pub use santa::{Santa, SantaReport};
pub use workshop::{Roster, Workshop};
