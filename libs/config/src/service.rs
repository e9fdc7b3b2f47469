//! Service defaults
//!
//! Default values used by the workshop service when neither the settings
//! file nor the environment override them.

/// Shared-memory region defaults
pub mod region {
    /// Preferred directory for region files (tmpfs on Linux)
    pub const SHM_DIR: &str = "/dev/shm";

    /// Region file name prefix; the manager appends its pid
    pub const FILE_PREFIX: &str = "santa-workshop";

    /// Region file extension
    pub const FILE_EXTENSION: &str = "shm";
}

/// Output defaults
pub mod output {
    /// Action log written by the actors
    pub const LOG_FILE: &str = "proj2.out";

    /// Diagnostic log level for the manager
    pub const LOG_LEVEL: &str = "info";

    /// Diagnostic log level for actor processes
    pub const ACTOR_LOG_LEVEL: &str = "warn";
}

/// Environment prefix for settings overrides (`WORKSHOP_OUTPUT=...`)
pub const ENV_PREFIX: &str = "WORKSHOP";
