use std::fmt;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Shutdown,
    Reboot,
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => f.write_str("shutdown"),
            Self::Reboot => f.write_str("reboot"),
        }
    }
}

/// Terminal host operations. Requests are fire-and-forget.
pub trait SystemControl: Send + Sync {
    fn shutdown(&self) -> Result<()>;
    fn reboot(&self) -> Result<()>;

    fn request(&self, action: PowerAction) -> Result<()> {
        match action {
            PowerAction::Shutdown => self.shutdown(),
            PowerAction::Reboot => self.reboot(),
        }
    }
}

/// Spawns a configured command line for each power action.
#[derive(Debug, Clone)]
pub struct CommandSystemControl {
    shutdown: Vec<String>,
    reboot: Vec<String>,
}

impl CommandSystemControl {
    pub fn new(shutdown: Vec<String>, reboot: Vec<String>) -> Self {
        Self { shutdown, reboot }
    }

    fn spawn(&self, action: PowerAction) -> Result<()> {
        let argv = match action {
            PowerAction::Shutdown => &self.shutdown,
            PowerAction::Reboot => &self.reboot,
        };
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("no {action} command configured"))?;

        info!(%action, command = ?argv, "requesting host {action}");
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn {action} command {argv:?}"))?;
        Ok(())
    }
}

impl SystemControl for CommandSystemControl {
    fn shutdown(&self) -> Result<()> {
        self.spawn(PowerAction::Shutdown)
    }

    fn reboot(&self) -> Result<()> {
        self.spawn(PowerAction::Reboot)
    }
}
