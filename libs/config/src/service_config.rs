//! Run Parameters and Service Settings
//!
//! [`SimulationConfig`] carries the four numbers the simulation is started
//! with plus the dynamic-elf switch, and validates them against
//! [`crate::protocol::limits`]. [`WorkshopSettings`] holds where things live
//! on disk and how chatty diagnostics are; it is loaded from an optional TOML
//! file with `WORKSHOP_*` environment overrides.

use crate::protocol::limits;
use crate::service;
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{parameter} must be within {min}..={max}, got {value}")]
    OutOfRange {
        parameter: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("Failed to load settings: {0}")]
    Settings(#[from] config_crate::ConfigError),
}

/// Parameters of one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of elves spawned at start (`NE`)
    pub elves: u32,
    /// Number of reindeer (`NR`)
    pub reindeer: u32,
    /// Upper bound of a single elf work period in milliseconds (`TE`)
    pub elf_work_ms: u32,
    /// Upper bound of the reindeer vacation in milliseconds (`TR`)
    pub reindeer_vacation_ms: u32,
    /// Whether `SIGUSR1` recruits additional elves
    #[serde(default)]
    pub dynamic_elves: bool,
}

impl SimulationConfig {
    pub fn new(elves: u32, reindeer: u32, elf_work_ms: u32, reindeer_vacation_ms: u32) -> Self {
        Self {
            elves,
            reindeer,
            elf_work_ms,
            reindeer_vacation_ms,
            dynamic_elves: false,
        }
    }

    pub fn with_dynamic_elves(mut self, enabled: bool) -> Self {
        self.dynamic_elves = enabled;
        self
    }

    /// Check every parameter against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("NE", self.elves, &limits::ELVES)?;
        check("NR", self.reindeer, &limits::REINDEER)?;
        check("TE", self.elf_work_ms, &limits::ELF_WORK_MS)?;
        check("TR", self.reindeer_vacation_ms, &limits::REINDEER_VACATION_MS)?;
        Ok(())
    }

    /// Consume and return the config if it is valid
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Number of actor processes started at launch (Santa included)
    pub fn initial_actor_count(&self) -> u32 {
        1 + self.elves + self.reindeer
    }
}

fn check(parameter: &'static str, value: u32, range: &RangeInclusive<u32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            parameter,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// Where the service keeps its files and how it logs
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WorkshopSettings {
    /// Directory holding the shared-memory region file
    pub shm_dir: PathBuf,
    /// Action log written by the actors
    pub output: PathBuf,
    /// Diagnostic log level (tracing filter directive)
    pub log_level: String,
}

impl Default for WorkshopSettings {
    fn default() -> Self {
        Self {
            shm_dir: default_shm_dir(),
            output: PathBuf::from(service::output::LOG_FILE),
            log_level: service::output::LOG_LEVEL.to_string(),
        }
    }
}

fn default_shm_dir() -> PathBuf {
    let shm = PathBuf::from(service::region::SHM_DIR);
    if shm.is_dir() {
        shm
    } else {
        std::env::temp_dir()
    }
}

impl WorkshopSettings {
    /// Load settings from an optional TOML file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("shm_dir", defaults.shm_dir.to_string_lossy().into_owned())?
            .set_default("output", defaults.output.to_string_lossy().into_owned())?
            .set_default("log_level", defaults.log_level)?;

        if let Some(path) = path {
            debug!("Loading workshop settings from {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        // Override with environment variables (WORKSHOP_ prefix)
        builder = builder.add_source(Environment::with_prefix(service::ENV_PREFIX).try_parsing(true));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Region file path for a manager with the given pid
    pub fn region_path(&self, manager_pid: u32) -> PathBuf {
        self.shm_dir.join(format!(
            "{}-{}.{}",
            service::region::FILE_PREFIX,
            manager_pid,
            service::region::FILE_EXTENSION
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_accepts_boundaries() {
        assert!(SimulationConfig::new(1, 1, 0, 0).validate().is_ok());
        assert!(SimulationConfig::new(999, 19, 1000, 1000).validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_elves() {
        let err = SimulationConfig::new(0, 5, 10, 10).validate().unwrap_err();
        match err {
            ConfigError::OutOfRange { parameter, value, .. } => {
                assert_eq!(parameter, "NE");
                assert_eq!(value, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_twenty_reindeer() {
        let err = SimulationConfig::new(5, 20, 10, 10).validate().unwrap_err();
        assert!(err.to_string().contains("NR"));
    }

    #[test]
    fn test_initial_actor_count() {
        let config = SimulationConfig::new(7, 3, 0, 0);
        assert_eq!(config.initial_actor_count(), 11);
    }

    #[test]
    fn test_load_defaults_without_file() {
        let settings = WorkshopSettings::load(None).unwrap();
        assert_eq!(settings.output, PathBuf::from(service::output::LOG_FILE));
        assert!(settings.shm_dir.is_dir());
    }

    #[test]
    fn test_load_settings_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("workshop.toml");

        let config_content = r#"
shm_dir = "/tmp/workshop-test"
output = "run.out"
log_level = "debug"
"#;

        fs::write(&config_path, config_content).unwrap();

        let settings = WorkshopSettings::load(Some(config_path.as_path())).unwrap();
        assert_eq!(settings.shm_dir, PathBuf::from("/tmp/workshop-test"));
        assert_eq!(settings.output, PathBuf::from("run.out"));
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_missing_settings_file_is_error() {
        let dir = tempdir().unwrap();
        let result = WorkshopSettings::load(Some(dir.path().join("absent.toml").as_path()));
        assert!(matches!(result, Err(ConfigError::Settings(_))));
    }

    #[test]
    fn test_region_path_includes_pid() {
        let settings = WorkshopSettings {
            shm_dir: PathBuf::from("/dev/shm"),
            ..WorkshopSettings::default()
        };
        assert_eq!(
            settings.region_path(4242),
            PathBuf::from("/dev/shm/santa-workshop-4242.shm")
        );
    }

    proptest! {
        #[test]
        fn prop_in_range_parameters_validate(
            ne in limits::ELVES,
            nr in limits::REINDEER,
            te in limits::ELF_WORK_MS,
            tr in limits::REINDEER_VACATION_MS,
        ) {
            prop_assert!(SimulationConfig::new(ne, nr, te, tr).validate().is_ok());
        }

        #[test]
        fn prop_too_many_reindeer_rejected(nr in 20u32..10_000) {
            prop_assert!(SimulationConfig::new(3, nr, 0, 0).validate().is_err());
        }

        #[test]
        fn prop_slow_elves_rejected(te in 1001u32..100_000) {
            prop_assert!(SimulationConfig::new(3, 3, te, 0).validate().is_err());
        }
    }
}
