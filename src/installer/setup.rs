//! The application's own one-time setup procedure

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{Environment, InstallProfile};

/// Failure reason reported by a setup procedure
pub type SetupResult = std::result::Result<(), String>;

/// One-time, non-idempotent setup (schema creation, admin account, ...)
///
/// Implementations must tolerate being re-run after a partial failure: the marker is only
/// written once `run` succeeds, so an interrupted setup starts over on the next boot.
#[async_trait]
pub trait SetupProcedure: Send + Sync {
    async fn run(&self, env: &Environment) -> SetupResult;
}

/// Runs the profile's `install.command` with exactly the environment snapshot
#[derive(Debug, Clone, Default)]
pub struct CommandSetup {
    command: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandSetup {
    pub fn new(command: Vec<String>, working_dir: Option<PathBuf>) -> Self {
        Self {
            command,
            working_dir,
        }
    }

    pub fn from_profile(install: Option<&InstallProfile>) -> Self {
        install.map_or_else(Self::default, |install| {
            Self::new(install.command.clone(), install.working_dir.clone())
        })
    }
}

#[async_trait]
impl SetupProcedure for CommandSetup {
    async fn run(&self, env: &Environment) -> SetupResult {
        let Some((program, args)) = self.command.split_first() else {
            tracing::debug!("no setup command configured, recording marker only");
            return Ok(());
        };

        let mut command = Command::new(program);
        command.args(args).env_clear().envs(env.iter());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::info!(program = %program, "running setup command");
        let status = command
            .status()
            .await
            .map_err(|e| format!("failed to start '{program}': {e}"))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("'{program}' exited with {status}"))
        }
    }
}
