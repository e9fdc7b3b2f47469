//! Actor error types

use ipc::IpcError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ActorError>;

#[derive(Error, Debug)]
pub enum ActorError {
    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error("Failed to open action log {path:?}: {source}")]
    JournalOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write action log: {0}")]
    JournalWrite(#[source] std::io::Error),

    #[error("Unknown actor kind '{0}' (expected santa, elf or reindeer)")]
    UnknownKind(String),
}
