//! Container start pipeline
//!
//! Drives one start through its phases:
//!
//! ```text
//! WaitingForDependency -> Installing -> Installed -> Reconciling -> [Integrating] -> Ready
//! ```
//!
//! Only the dependency wait and the installation can abort a start. Reconciliation and
//! integration problems end up in the [`RunReport`] as warnings.

use std::fmt;

use crate::config::RunConfig;
use crate::database::{Database, mask_password, resolve_url};
use crate::error::Result;
use crate::installer::secrets::{ensure_secrets, secrets_path};
use crate::installer::{InstallOutcome, Installer, SetupProcedure};
use crate::integration::{IntegrationOutcome, Integrator};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::state::StateStore;
use crate::wait::wait_until_ready;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForDependency,
    Installing,
    Installed,
    Reconciling,
    Integrating,
    Ready,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::WaitingForDependency => "waiting-for-dependency",
            Phase::Installing => "installing",
            Phase::Installed => "installed",
            Phase::Reconciling => "reconciling",
            Phase::Integrating => "integrating",
            Phase::Ready => "ready",
        };
        f.write_str(name)
    }
}

fn enter(phase: Phase) {
    tracing::info!(phase = %phase, "entering phase");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub secrets_generated: usize,
    /// Attempt on which the dependency answered; `None` without a database
    pub wait_attempts: Option<u32>,
    pub install: InstallOutcome,
    pub reconcile: ReconcileReport,
    pub integration: IntegrationOutcome,
}

/// Run every phase up to `Ready`
///
/// Generated secrets are added to `config.env`, so the caller hands the same snapshot to
/// the application.
pub async fn run(
    config: &mut RunConfig,
    db: Option<&dyn Database>,
    setup: &dyn SetupProcedure,
) -> Result<RunReport> {
    tracing::info!(
        component = config.component(),
        version = config.version(),
        state_dir = %config.state_dir.display(),
        "starting provisioning"
    );

    let secrets_generated = match config.profile.install.as_ref() {
        Some(install) if !install.secrets.is_empty() => ensure_secrets(
            &secrets_path(&config.state_dir, config.component()),
            &install.secrets,
            &mut config.env,
        )?,
        _ => 0,
    };
    let config = &*config;

    let wait_attempts = match (db, &config.profile.database) {
        (Some(db), Some(database)) => {
            enter(Phase::WaitingForDependency);
            let target = resolve_url(database, &config.env)
                .map_or_else(|_| "database".to_string(), |url| mask_password(&url));
            Some(wait_until_ready(&target, database.wait, || db.probe()).await?)
        }
        _ => None,
    };

    enter(Phase::Installing);
    let store = StateStore::new(&config.state_dir, config.component());
    let install = Installer::new(&store, config.component(), config.version(), setup)
        .ensure_installed(&config.env)
        .await?;
    enter(Phase::Installed);

    enter(Phase::Reconciling);
    let reconcile = Reconciler::new(config, db).reconcile().await?;

    let integration = match (db, &config.profile.integration) {
        (_, None) => IntegrationOutcome::NotConfigured,
        (Some(db), Some(_)) => {
            enter(Phase::Integrating);
            Integrator::new(config, &store, db).integrate().await
        }
        (None, Some(_)) => IntegrationOutcome::Failed {
            reason: "no database connection".to_string(),
        },
    };

    enter(Phase::Ready);
    let fresh = matches!(install, InstallOutcome::Installed(_));
    tracing::info!(
        fresh_install = fresh,
        reconcile_warnings = reconcile.warnings.len(),
        integration = integration.label(),
        "provisioning complete"
    );

    Ok(RunReport {
        secrets_generated,
        wait_attempts,
        install,
        reconcile,
        integration,
    })
}
