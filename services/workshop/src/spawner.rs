//! Actor Process Spawner
//!
//! Every actor is this same executable re-entered through the hidden `actor`
//! subcommand:
//!
//! ```text
//! santa-workshop actor --role elf --id 4 --region /dev/shm/santa-workshop-812.shm \
//!                      --output proj2.out --manager-pid 812
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::debug;
use workshop_actors::ActorLabel;

/// A running actor process owned by the manager
pub struct ActorHandle {
    label: ActorLabel,
    child: Child,
}

impl ActorHandle {
    pub fn label(&self) -> ActorLabel {
        self.label
    }

    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Send SIGKILL; an already exited child is not an error
    pub fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("{} was already gone: {}", self.label, e);
        }
    }
}

impl fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("label", &self.label)
            .field("pid", &self.child.id())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Spawner {
    program: PathBuf,
    region: PathBuf,
    output: PathBuf,
    manager_pid: u32,
}

impl Spawner {
    /// Spawner re-running the current executable
    pub fn current_exe(region: &Path, output: &Path) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, region, output))
    }

    pub fn new(program: impl Into<PathBuf>, region: &Path, output: &Path) -> Self {
        Self {
            program: program.into(),
            region: region.to_path_buf(),
            output: output.to_path_buf(),
            manager_pid: std::process::id(),
        }
    }

    pub fn command(&self, label: ActorLabel) -> Command {
        let id = match label {
            ActorLabel::Santa => 0,
            ActorLabel::Elf(id) | ActorLabel::Reindeer(id) => id,
        };

        let mut command = Command::new(&self.program);
        command
            .arg("actor")
            .arg("--role")
            .arg(label.kind().to_string())
            .arg("--id")
            .arg(id.to_string())
            .arg("--region")
            .arg(&self.region)
            .arg("--output")
            .arg(&self.output)
            .arg("--manager-pid")
            .arg(self.manager_pid.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    pub fn spawn(&self, label: ActorLabel) -> std::io::Result<ActorHandle> {
        let child = self.command(label).spawn()?;
        debug!("Spawned {} as pid {:?}", label, child.id());
        Ok(ActorHandle { label, child })
    }
}
