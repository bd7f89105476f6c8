//! Configuration handling for the provisioner
//!
//! This module contains:
//! - [`profile`]: the static `profile.yaml` describing one application bundle
//! - [`environment`]: the environment snapshot captured at process entry
//!
//! [`RunConfig`] combines both into the single explicit configuration value that is
//! passed to every component.

pub mod environment;
pub mod profile;

use std::path::PathBuf;

pub use environment::Environment;
pub use profile::{
    BaseUrlProfile, ConfigFileProfile, ConfigFormat, DatabaseProfile, Driver, InstallProfile,
    IntegrationProfile, Profile, SecretSpec, SettingKey, SettingsProfile, WaitPolicy,
};

/// Overrides the profile's `state_dir`
pub const STATE_DIR_ENV: &str = "PROVISIONER_STATE_DIR";

/// Profile plus environment, resolved once per process
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub profile: Profile,
    pub env: Environment,
    pub state_dir: PathBuf,
}

impl RunConfig {
    pub fn new(profile: Profile, env: Environment) -> Self {
        let state_dir = env
            .get(STATE_DIR_ENV)
            .map_or_else(|| profile.state_dir.clone(), PathBuf::from);
        Self {
            profile,
            env,
            state_dir,
        }
    }

    pub fn component(&self) -> &str {
        &self.profile.name
    }

    pub fn version(&self) -> &str {
        &self.profile.version
    }
}
