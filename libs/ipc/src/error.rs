//! IPC Error Types
//!
//! Failures of the shared primitives and of the region that hosts them.
//! Teardown failures are collected rather than short-circuited, see
//! [`TeardownError`].

use nix::errno::Errno;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for IPC operations
pub type Result<T> = std::result::Result<T, IpcError>;

/// Main IPC error type
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to initialize semaphore '{name}': {source}")]
    SemaphoreInit {
        name: String,
        #[source]
        source: Errno,
    },

    #[error("Failed to destroy semaphore '{name}': {source}")]
    SemaphoreDestroy {
        name: String,
        #[source]
        source: Errno,
    },

    #[error("Wait on semaphore '{name}' failed: {source}")]
    Wait {
        name: String,
        #[source]
        source: Errno,
    },

    #[error("Post to semaphore '{name}' failed: {source}")]
    Post {
        name: String,
        #[source]
        source: Errno,
    },

    #[error("Semaphore name '{name}' exceeds {max} bytes")]
    NameTooLong { name: String, max: usize },

    #[error("Failed to create shared region {path:?}: {source}")]
    RegionCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to map shared region {path:?}: {source}")]
    RegionMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to attach shared region {path:?}: {source}")]
    RegionAttach {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Shared region {path:?} does not hold the expected layout \
         (magic {found_magic:#x}, size {found_size}; expected {expected_magic:#x}, {expected_size})"
    )]
    LayoutMismatch {
        path: PathBuf,
        expected_magic: u64,
        found_magic: u64,
        expected_size: u64,
        found_size: u64,
    },

    #[error("Failed to remove shared region {path:?}: {source}")]
    RegionRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Every failure observed while tearing a region down
///
/// Teardown keeps going after the first failure, so a single report may
/// carry several independent problems.
#[derive(Debug)]
pub struct TeardownError {
    pub failures: Vec<IpcError>,
}

impl TeardownError {
    /// `Ok(())` when nothing failed, otherwise the aggregated error
    pub fn check(failures: Vec<IpcError>) -> std::result::Result<(), TeardownError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }
}

impl fmt::Display for TeardownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} teardown step(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for TeardownError {}
