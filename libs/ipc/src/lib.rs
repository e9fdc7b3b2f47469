//! Cross-Process Synchronization Primitives
//!
//! Building blocks for state shared between independently scheduled OS
//! processes:
//!
//! - [`Semaphore`]: POSIX process-shared counting semaphore
//! - [`Guarded`]: value + mutex, reachable only while the mutex is held
//! - [`OnceFlag`]: single-writer false → true flag
//! - [`SharedRegion`]: file-backed `MAP_SHARED` mapping hosting a
//!   [`SharedLayout`], with aggregated teardown
//!
//! # Architecture
//!
//! ```text
//! ┌────────── process A ──────────┐     ┌────────── process B ──────────┐
//! │ SharedRegion<L> (Owner)       │     │ SharedRegion<L> (Attached)    │
//! │        │ Deref                │     │        │ Deref                │
//! └────────┼──────────────────────┘     └────────┼──────────────────────┘
//!          ▼                                     ▼
//!   ┌─────────────── /dev/shm/<name>.shm (MAP_SHARED) ───────────────┐
//!   │ header (magic, size) │ L { Semaphore.., Guarded<..>, OnceFlag } │
//!   └────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod flag;
pub mod guarded;
pub mod region;
pub mod semaphore;

pub use error::{IpcError, Result, TeardownError};
pub use flag::OnceFlag;
pub use guarded::{Guarded, GuardedRef};
pub use region::{RegionRole, SharedLayout, SharedRegion};
pub use semaphore::{Primitive, Semaphore, NAME_CAPACITY};
