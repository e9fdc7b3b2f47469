//! Ordered Action Log
//!
//! Every actor process appends to the same output file. The line number and
//! the physical write happen under `journal_mutex`, so the numbers in the file
//! are gap-free and match the order of the lines.
//!
//! ```text
//! 1: Santa: going to sleep
//! 2: Elf 1: started
//! 3: RD 1: started
//! ```

use crate::error::{ActorError, Result};
use crate::workshop::Workshop;
use ipc::Guarded;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::trace;
use workshop_config::journal::{ELF_LABEL, REINDEER_LABEL, SANTA_LABEL};

/// The three kinds of actor process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Santa,
    Elf,
    Reindeer,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ActorKind::Santa => "santa",
            ActorKind::Elf => "elf",
            ActorKind::Reindeer => "reindeer",
        };
        f.write_str(kind)
    }
}

impl FromStr for ActorKind {
    type Err = ActorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "santa" => Ok(ActorKind::Santa),
            "elf" => Ok(ActorKind::Elf),
            "reindeer" | "rd" => Ok(ActorKind::Reindeer),
            _ => Err(ActorError::UnknownKind(s.to_string())),
        }
    }
}

/// How an actor is named in the action log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorLabel {
    Santa,
    Elf(u32),
    Reindeer(u32),
}

impl ActorLabel {
    pub fn new(kind: ActorKind, id: u32) -> Self {
        match kind {
            ActorKind::Santa => ActorLabel::Santa,
            ActorKind::Elf => ActorLabel::Elf(id),
            ActorKind::Reindeer => ActorLabel::Reindeer(id),
        }
    }

    pub fn kind(&self) -> ActorKind {
        match self {
            ActorLabel::Santa => ActorKind::Santa,
            ActorLabel::Elf(_) => ActorKind::Elf,
            ActorLabel::Reindeer(_) => ActorKind::Reindeer,
        }
    }
}

impl fmt::Display for ActorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorLabel::Santa => f.write_str(SANTA_LABEL),
            ActorLabel::Elf(id) => write!(f, "{} {}", ELF_LABEL, id),
            ActorLabel::Reindeer(id) => write!(f, "{} {}", REINDEER_LABEL, id),
        }
    }
}

/// This process's handle on the shared action log
pub struct Journal<'w> {
    sequence: &'w Guarded<u32>,
    sink: File,
}

impl<'w> Journal<'w> {
    /// Open `path` for appending; the file must already exist.
    pub fn open(workshop: &'w Workshop, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let sink = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| ActorError::JournalOpen {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            sequence: &workshop.action_log,
            sink,
        })
    }

    /// Append one numbered line and return its number
    pub fn record(&mut self, actor: ActorLabel, message: &str) -> Result<u32> {
        let mut written = self.sequence.lock()?;
        let number = *written + 1;

        let line = format!("{}: {}: {}\n", number, actor, message);
        self.sink
            .write_all(line.as_bytes())
            .and_then(|()| self.sink.flush())
            .map_err(ActorError::JournalWrite)?;

        *written = number;
        drop(written);

        trace!(target: "journal", "{}", line.trim_end());
        Ok(number)
    }
}

impl fmt::Debug for Journal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journal").field("sink", &self.sink).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workshop::Roster;
    use ipc::SharedRegion;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;
    use workshop_config::SimulationConfig;

    #[test]
    fn test_labels() {
        assert_eq!(ActorLabel::Santa.to_string(), "Santa");
        assert_eq!(ActorLabel::Elf(12).to_string(), "Elf 12");
        assert_eq!(ActorLabel::Reindeer(3).to_string(), "RD 3");
        assert_eq!(ActorLabel::new(ActorKind::Elf, 4), ActorLabel::Elf(4));
        assert_eq!(ActorLabel::Reindeer(1).kind(), ActorKind::Reindeer);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("santa".parse::<ActorKind>().unwrap(), ActorKind::Santa);
        assert_eq!("Elf".parse::<ActorKind>().unwrap(), ActorKind::Elf);
        assert_eq!("reindeer".parse::<ActorKind>().unwrap(), ActorKind::Reindeer);
        assert!(matches!(
            "grinch".parse::<ActorKind>(),
            Err(ActorError::UnknownKind(kind)) if kind == "grinch"
        ));
        for kind in [ActorKind::Santa, ActorKind::Elf, ActorKind::Reindeer] {
            assert_eq!(kind.to_string().parse::<ActorKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_open_requires_existing_file() {
        let dir = tempdir().unwrap();
        let region = SharedRegion::<Workshop>::create(
            dir.path().join("w.shm"),
            Roster::from(SimulationConfig::new(1, 1, 0, 0)),
        )
        .unwrap();

        let err = Journal::open(&region, dir.path().join("missing.out")).unwrap_err();
        assert!(matches!(err, ActorError::JournalOpen { .. }));

        unsafe { region.teardown().unwrap() };
    }

    #[test]
    fn test_concurrent_writers_produce_contiguous_numbers() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("actions.out");
        File::create(&log_path).unwrap();
        let region = Arc::new(
            SharedRegion::<Workshop>::create(
                dir.path().join("w.shm"),
                Roster::from(SimulationConfig::new(4, 1, 0, 0)),
            )
            .unwrap(),
        );

        let writers: Vec<_> = (1..=4u32)
            .map(|id| {
                let region = Arc::clone(&region);
                let log_path = log_path.clone();
                thread::spawn(move || {
                    let mut journal = Journal::open(&region, &log_path).unwrap();
                    for _ in 0..50 {
                        journal.record(ActorLabel::Elf(id), "started").unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let numbers: Vec<u32> = contents
            .lines()
            .map(|line| line.split(": ").next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(numbers, (1..=200).collect::<Vec<_>>());
        assert!(contents.lines().all(|line| line.ends_with(": started")));
        assert_eq!(region.actions_recorded().unwrap(), 200);

        let region = Arc::try_unwrap(region).unwrap();
        unsafe { region.teardown().unwrap() };
    }
}
