//! Control Channel
//!
//! Turns the signals the manager reacts to into events for its event loop.
//! Handlers only enqueue; recruiting and aborting happen in the loop.
//!
//! | Signal                     | Event                         |
//! |----------------------------|-------------------------------|
//! | `SIGUSR1`                  | `Recruit` (dynamic runs only) |
//! | `SIGINT`/`SIGTERM`/`SIGQUIT` | `Fatal`                     |

use std::fmt;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

/// Signals that end the run with a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalSignal {
    Interrupt,
    Terminate,
    Quit,
}

impl fmt::Display for FatalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FatalSignal::Interrupt => "SIGINT",
            FatalSignal::Terminate => "SIGTERM",
            FatalSignal::Quit => "SIGQUIT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Spawn another batch of elves
    Recruit,
    Fatal(FatalSignal),
}

pub struct ControlChannel {
    recruit: Signal,
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
    dynamic_elves: bool,
}

impl ControlChannel {
    /// Register every handler. Must run inside the tokio runtime.
    pub fn install(dynamic_elves: bool) -> std::io::Result<Self> {
        Ok(Self {
            recruit: signal(SignalKind::user_defined1())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
            dynamic_elves,
        })
    }

    /// Wait for the next event the manager has to act on
    pub async fn recv(&mut self) -> ControlEvent {
        loop {
            tokio::select! {
                Some(()) = self.interrupt.recv() => return ControlEvent::Fatal(FatalSignal::Interrupt),
                Some(()) = self.terminate.recv() => return ControlEvent::Fatal(FatalSignal::Terminate),
                Some(()) = self.quit.recv() => return ControlEvent::Fatal(FatalSignal::Quit),
                Some(()) = self.recruit.recv() => {
                    if self.dynamic_elves {
                        return ControlEvent::Recruit;
                    }
                    debug!("SIGUSR1 ignored: dynamic elves are disabled");
                }
                // Signal streams never close while the runtime is alive.
                else => std::future::pending::<()>().await,
            }
        }
    }
}

impl fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlChannel")
            .field("dynamic_elves", &self.dynamic_elves)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::{raise, Signal as NixSignal};
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_fatal_signal_names() {
        assert_eq!(FatalSignal::Interrupt.to_string(), "SIGINT");
        assert_eq!(FatalSignal::Terminate.to_string(), "SIGTERM");
        assert_eq!(FatalSignal::Quit.to_string(), "SIGQUIT");
    }

    // One test drives every raised signal: handlers are process-wide.
    #[tokio::test]
    async fn test_signals_map_to_events() {
        let mut control = ControlChannel::install(true).unwrap();

        raise(NixSignal::SIGUSR1).unwrap();
        let event = timeout(Duration::from_secs(5), control.recv()).await.unwrap();
        assert_eq!(event, ControlEvent::Recruit);

        raise(NixSignal::SIGQUIT).unwrap();
        let event = timeout(Duration::from_secs(5), control.recv()).await.unwrap();
        assert_eq!(event, ControlEvent::Fatal(FatalSignal::Quit));

        control.dynamic_elves = false;
        raise(NixSignal::SIGUSR1).unwrap();
        assert!(timeout(Duration::from_millis(200), control.recv()).await.is_err());
    }
}
