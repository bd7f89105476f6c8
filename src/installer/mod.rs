//! One-time installation gate
//!
//! This module handles:
//! - Checking the state store for a marker of the desired version
//! - Running the application's setup procedure when no marker exists
//! - Writing the marker only after setup succeeded
//! - Generating secret material the setup and the application share ([`secrets`])

pub mod secrets;
pub mod setup;

use crate::config::Environment;
use crate::error::{ProvisionError, Result};
use crate::state::{InstallState, InstallationMarker, StateStore};

pub use setup::{CommandSetup, SetupProcedure, SetupResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// A marker for this version already existed; nothing was run
    AlreadyInstalled(InstallationMarker),
    /// Setup ran and the marker was written
    Installed(InstallationMarker),
}

impl InstallOutcome {
    pub fn marker(&self) -> &InstallationMarker {
        match self {
            InstallOutcome::AlreadyInstalled(marker) | InstallOutcome::Installed(marker) => marker,
        }
    }
}

pub struct Installer<'a> {
    store: &'a StateStore,
    component: &'a str,
    version: &'a str,
    setup: &'a dyn SetupProcedure,
}

impl<'a> Installer<'a> {
    pub fn new(
        store: &'a StateStore,
        component: &'a str,
        version: &'a str,
        setup: &'a dyn SetupProcedure,
    ) -> Self {
        Self {
            store,
            component,
            version,
            setup,
        }
    }

    /// Run setup at most once per version
    ///
    /// Setup failure is fatal and leaves no marker behind, so the next start retries the
    /// whole setup.
    pub async fn ensure_installed(&self, env: &Environment) -> Result<InstallOutcome> {
        match self.store.read(self.version)? {
            InstallState::Installed(marker) | InstallState::IntegrationComplete(marker) => {
                tracing::info!(
                    component = self.component,
                    version = self.version,
                    installed_at = %marker.installed_at,
                    "already installed, skipping setup"
                );
                return Ok(InstallOutcome::AlreadyInstalled(marker));
            }
            InstallState::NotInstalled => {}
        }

        tracing::info!(
            component = self.component,
            version = self.version,
            "no installation marker, running setup"
        );
        self.setup
            .run(env)
            .await
            .map_err(|reason| ProvisionError::InstallationFailed {
                component: self.component.to_string(),
                version: self.version.to_string(),
                reason,
            })?;

        let marker = self.store.mark_installed(self.version)?;
        tracing::info!(
            component = self.component,
            version = self.version,
            marker = %self.store.marker_path(self.version).display(),
            "installation complete"
        );
        Ok(InstallOutcome::Installed(marker))
    }
}
