//! Command helper utilities

use std::future::Future;
use std::path::Path;

use crate::config::{Environment, Profile, RunConfig};
use crate::database::{SqlDatabase, mask_password, resolve_url};
use crate::error::{ProvisionError, Result};

/// Load the profile and capture the process environment
pub fn load_config(profile_path: &Path) -> Result<RunConfig> {
    let profile = Profile::load(profile_path)?;
    tracing::debug!(profile = %profile_path.display(), component = %profile.name, "profile loaded");
    Ok(RunConfig::new(profile, Environment::from_process()))
}

/// Open a lazy connection pool when the profile has a database
///
/// Must be called from within the runtime; the pool spawns its maintenance task on it.
/// Returns the password-masked URL alongside the pool.
pub fn connect(config: &RunConfig) -> Result<Option<(String, SqlDatabase)>> {
    let Some(database) = &config.profile.database else {
        return Ok(None);
    };
    let url = resolve_url(database, &config.env)?;
    let target = mask_password(&url);
    tracing::debug!(target_name = %target, "database configured");
    Ok(Some((target, SqlDatabase::connect_lazy(&url)?)))
}

/// Drive a future to completion on a single-threaded runtime
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ProvisionError::IoError {
            message: format!("Failed to start async runtime: {e}"),
        })?;
    Ok(runtime.block_on(future))
}
