//! # Workshop Configuration
//!
//! Centralized parameters and constants for the workshop simulator, shared by
//! the actor library and the service binary.
//!
//! ## Features
//!
//! - **Protocol Constants**: elf batch size, queue admission, log labels
//! - **Run Parameters**: validated elf/reindeer counts and timing bounds
//! - **Service Settings**: shared-memory directory, output file, log level
//!
//! ## Usage
//!
//! ```rust
//! use workshop_config::{protocol, SimulationConfig};
//!
//! let config = SimulationConfig::new(5, 4, 100, 200).validated().unwrap();
//! assert_eq!(protocol::ELF_BATCH_SIZE, 3);
//! assert_eq!(config.elves, 5);
//! ```

pub mod protocol;
pub mod service;
pub mod service_config;

// Re-export commonly used types
pub use protocol::*;
pub use service_config::{ConfigError, SimulationConfig, WorkshopSettings};
