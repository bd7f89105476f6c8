//! Hand-off to the wrapped application
//!
//! On Unix the provisioner replaces itself with the application via `exec`, so the
//! application becomes the container's main process and its exit code is the
//! container's. Elsewhere the application runs as a child and its exit code is forwarded.

use std::process::Command;

use crate::config::Environment;
use crate::error::{ProvisionError, Result};

/// Pick the command line: an explicit override wins over the profile's `exec`
pub fn resolve_command(override_cmd: &[String], profile_cmd: &[String]) -> Result<Vec<String>> {
    let command = if override_cmd.is_empty() {
        profile_cmd
    } else {
        override_cmd
    };
    if command.is_empty() {
        return Err(ProvisionError::NoCommand);
    }
    Ok(command.to_vec())
}

fn build(command: &[String], env: &Environment) -> Result<Command> {
    let (program, args) = command.split_first().ok_or(ProvisionError::NoCommand)?;
    let mut cmd = Command::new(program);
    cmd.args(args).env_clear().envs(env.iter());
    Ok(cmd)
}

/// Replace the current process with `command`
///
/// Only returns on failure.
#[cfg(unix)]
pub fn exec(command: &[String], env: &Environment) -> Result<std::convert::Infallible> {
    use std::os::unix::process::CommandExt;

    let mut cmd = build(command, env)?;
    tracing::info!(program = %command[0], "handing off");
    let err = cmd.exec();
    Err(ProvisionError::HandoffFailed {
        program: command[0].clone(),
        reason: err.to_string(),
    })
}

/// Run `command` to completion and exit with its status
#[cfg(not(unix))]
pub fn exec(command: &[String], env: &Environment) -> Result<std::convert::Infallible> {
    let mut cmd = build(command, env)?;
    tracing::info!(program = %command[0], "handing off");
    let status = cmd.status().map_err(|e| ProvisionError::HandoffFailed {
        program: command[0].clone(),
        reason: e.to_string(),
    })?;
    std::process::exit(status.code().unwrap_or(1));
}
