//! One-time cross-application integration
//!
//! Operators supply SQL fragments as `PREFIX_1`, `PREFIX_2`, ... The fragments are joined
//! into one unit, executed once against the application database, verified and then
//! recorded in the installation marker. Scanning stops at the first missing index, so a
//! fragment after a gap is never executed; such fragments are reported.

use crate::config::{Environment, IntegrationProfile, RunConfig};
use crate::database::Database;
use crate::error::{ProvisionError, Result};
use crate::state::{InstallState, StateStore};

/// Separator between fragments in the composed unit
const FRAGMENT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: u32,
    pub variable: String,
    pub sql: String,
}

/// Fragments joined in index order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedUnit {
    pub fragments: Vec<Fragment>,
    /// Variables set beyond the first gap, in index order
    pub excluded: Vec<String>,
}

impl ComposedUnit {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn sql(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.sql.as_str())
            .collect::<Vec<_>>()
            .join(FRAGMENT_SEPARATOR)
    }

    /// BLAKE3 hex digest of [`ComposedUnit::sql`]
    pub fn checksum(&self) -> String {
        blake3::hash(self.sql().as_bytes()).to_hex().to_string()
    }
}

fn fragment_variable(prefix: &str, index: u32) -> String {
    format!("{prefix}_{index}")
}

/// Collect `prefix_1`, `prefix_2`, ... up to the first unset index
pub fn compose(env: &Environment, prefix: &str) -> ComposedUnit {
    let mut fragments = Vec::new();
    let mut index = 1;
    while let Some(sql) = env.get(&fragment_variable(prefix, index)) {
        fragments.push(Fragment {
            index,
            variable: fragment_variable(prefix, index),
            sql: sql.to_string(),
        });
        index += 1;
    }

    let marker = format!("{prefix}_");
    let mut beyond: Vec<(u32, String)> = env
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .filter_map(|(name, _)| {
            let n: u32 = name.strip_prefix(&marker)?.parse().ok()?;
            (n > index).then(|| (n, name.to_string()))
        })
        .collect();
    beyond.sort();

    ComposedUnit {
        fragments,
        excluded: beyond.into_iter().map(|(_, name)| name).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    /// No integration section in the profile
    NotConfigured,
    /// The enable flag is not truthy
    Disabled,
    AlreadyComplete,
    NoFragments,
    Completed { fragments: usize, checksum: String },
    /// Executing or verifying failed; retried on the next start
    Failed { reason: String },
}

impl IntegrationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            IntegrationOutcome::NotConfigured => "not configured",
            IntegrationOutcome::Disabled => "disabled",
            IntegrationOutcome::AlreadyComplete => "already complete",
            IntegrationOutcome::NoFragments => "no fragments",
            IntegrationOutcome::Completed { .. } => "completed",
            IntegrationOutcome::Failed { .. } => "failed",
        }
    }
}

pub struct Integrator<'a> {
    config: &'a RunConfig,
    store: &'a StateStore,
    db: &'a dyn Database,
}

impl<'a> Integrator<'a> {
    pub fn new(config: &'a RunConfig, store: &'a StateStore, db: &'a dyn Database) -> Self {
        Self { config, store, db }
    }

    /// Run the integration unit at most once per installed version
    ///
    /// Never fails the start: errors come back as [`IntegrationOutcome::Failed`] with the
    /// record withheld.
    pub async fn integrate(&self) -> IntegrationOutcome {
        let Some(integration) = &self.config.profile.integration else {
            return IntegrationOutcome::NotConfigured;
        };
        match self.try_integrate(integration).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let err = match err {
                    err @ ProvisionError::IntegrationFailed { .. } => err,
                    other => ProvisionError::IntegrationFailed {
                        reason: other.to_string(),
                    },
                };
                tracing::warn!(error = %err, "integration failed, continuing startup");
                IntegrationOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn try_integrate(&self, integration: &IntegrationProfile) -> Result<IntegrationOutcome> {
        if !self.config.env.is_truthy(&integration.enabled_env) {
            tracing::debug!(flag = %integration.enabled_env, "integration disabled");
            return Ok(IntegrationOutcome::Disabled);
        }

        let version = self.config.version();
        match self.store.read(version)? {
            InstallState::IntegrationComplete(_) => {
                tracing::info!(version, "integration already complete");
                return Ok(IntegrationOutcome::AlreadyComplete);
            }
            InstallState::NotInstalled => {
                return Err(ProvisionError::IntegrationFailed {
                    reason: format!("{} {} is not installed", self.config.component(), version),
                });
            }
            InstallState::Installed(_) => {}
        }

        let unit = compose(&self.config.env, &integration.fragment_prefix);
        if !unit.excluded.is_empty() {
            tracing::warn!(
                excluded = ?unit.excluded,
                "integration fragments after a gap in the numbering are ignored"
            );
        }
        if unit.is_empty() {
            tracing::info!(prefix = %integration.fragment_prefix, "no integration fragments supplied, skipping");
            return Ok(IntegrationOutcome::NoFragments);
        }

        let sql = unit.sql();
        tracing::info!(fragments = unit.fragments.len(), "executing integration unit");
        self.db
            .execute_script(&sql)
            .await
            .map_err(|e| ProvisionError::IntegrationFailed {
                reason: format!("executing fragments failed: {e}"),
            })?;

        for object in &integration.verify {
            self.db
                .check_queryable(object)
                .await
                .map_err(|e| ProvisionError::IntegrationFailed {
                    reason: format!("'{object}' is not queryable after integration: {e}"),
                })?;
        }

        let checksum = unit.checksum();
        self.store
            .mark_integrated(version, unit.fragments.len(), checksum.clone())?;
        tracing::info!(fragments = unit.fragments.len(), checksum = %checksum, "integration complete");

        Ok(IntegrationOutcome::Completed {
            fragments: unit.fragments.len(),
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{MemoryDatabase, run_config};
    use tempfile::TempDir;

    const PROFILE: &str = "name: gibbon\nversion: '26.0.00'\ndatabase:\n  url_env: DATABASE_URL\nintegration:\n  enabled_env: INTEGRATION_ON\n  fragment_prefix: MOODLE_SQL\n  verify: [gibbon_moodle_users]\n";

    #[test]
    fn test_compose_stops_at_gap() {
        let env = Environment::from_pairs([
            ("MOODLE_SQL_1", "CREATE VIEW a AS SELECT 1;"),
            ("MOODLE_SQL_3", "CREATE VIEW c AS SELECT 3;"),
            ("MOODLE_SQL_12", "CREATE VIEW l AS SELECT 12;"),
            ("OTHER_SQL_2", "SELECT 2;"),
        ]);
        let unit = compose(&env, "MOODLE_SQL");

        assert_eq!(unit.fragments.len(), 1);
        assert_eq!(unit.sql(), "CREATE VIEW a AS SELECT 1;");
        assert_eq!(
            unit.excluded,
            vec!["MOODLE_SQL_3".to_string(), "MOODLE_SQL_12".to_string()]
        );
    }

    #[test]
    fn test_compose_joins_in_index_order() {
        let env = Environment::from_pairs([
            ("P_2", "second;"),
            ("P_1", "first;"),
            ("P_3", "third;"),
        ]);
        let unit = compose(&env, "P");
        assert_eq!(unit.sql(), "first;\n\nsecond;\n\nthird;");
        assert!(unit.excluded.is_empty());
        assert_eq!(unit.checksum(), blake3::hash(b"first;\n\nsecond;\n\nthird;").to_hex().to_string());
    }

    #[test]
    fn test_compose_empty() {
        let unit = compose(&Environment::default(), "P");
        assert!(unit.is_empty());
        assert_eq!(unit.sql(), "");
    }

    fn installed(temp: &TempDir, vars: &[(&str, &str)]) -> (RunConfig, StateStore) {
        let config = run_config(PROFILE, temp.path(), vars);
        let store = StateStore::new(&config.state_dir, config.component());
        store.mark_installed(config.version()).unwrap();
        (config, store)
    }

    #[tokio::test]
    async fn test_integration_runs_once() {
        let temp = TempDir::new().unwrap();
        let (config, store) = installed(
            &temp,
            &[
                ("INTEGRATION_ON", "yes"),
                ("MOODLE_SQL_1", "CREATE VIEW gibbon_moodle_users AS SELECT 1;"),
            ],
        );
        let db = MemoryDatabase::creating(&["gibbon_moodle_users"]);
        let integrator = Integrator::new(&config, &store, &db);

        let first = integrator.integrate().await;
        assert!(matches!(first, IntegrationOutcome::Completed { fragments: 1, .. }));
        assert!(store.read(config.version()).unwrap().is_integrated());

        let second = integrator.integrate().await;
        assert_eq!(second, IntegrationOutcome::AlreadyComplete);
        assert_eq!(db.scripts().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_flag() {
        let temp = TempDir::new().unwrap();
        let (config, store) = installed(
            &temp,
            &[("INTEGRATION_ON", "off"), ("MOODLE_SQL_1", "SELECT 1;")],
        );
        let db = MemoryDatabase::new();

        let outcome = Integrator::new(&config, &store, &db).integrate().await;
        assert_eq!(outcome, IntegrationOutcome::Disabled);
        assert!(db.scripts().is_empty());
    }

    #[tokio::test]
    async fn test_no_fragments_writes_no_record() {
        let temp = TempDir::new().unwrap();
        let (config, store) = installed(&temp, &[("INTEGRATION_ON", "1"), ("MOODLE_SQL_2", "x")]);
        let db = MemoryDatabase::new();

        let outcome = Integrator::new(&config, &store, &db).integrate().await;
        assert_eq!(outcome, IntegrationOutcome::NoFragments);
        assert!(!store.read(config.version()).unwrap().is_integrated());
    }

    #[tokio::test]
    async fn test_execution_failure_withholds_record() {
        let temp = TempDir::new().unwrap();
        let (config, store) = installed(
            &temp,
            &[("INTEGRATION_ON", "true"), ("MOODLE_SQL_1", "CREAT VIEW;")],
        );
        let db = MemoryDatabase::creating(&["gibbon_moodle_users"]);
        db.set_fail_scripts(true);

        let outcome = Integrator::new(&config, &store, &db).integrate().await;
        assert!(matches!(outcome, IntegrationOutcome::Failed { ref reason } if reason.contains("executing fragments failed")));
        assert!(!store.read(config.version()).unwrap().is_integrated());
    }

    #[tokio::test]
    async fn test_verification_failure_withholds_record() {
        let temp = TempDir::new().unwrap();
        let (config, store) = installed(
            &temp,
            &[("INTEGRATION_ON", "on"), ("MOODLE_SQL_1", "SELECT 1;")],
        );
        let db = MemoryDatabase::new();

        let outcome = Integrator::new(&config, &store, &db).integrate().await;
        assert!(matches!(outcome, IntegrationOutcome::Failed { ref reason } if reason.contains("gibbon_moodle_users")));
        assert!(!store.read(config.version()).unwrap().is_integrated());
    }

    #[tokio::test]
    async fn test_not_installed_is_failure() {
        let temp = TempDir::new().unwrap();
        let config = run_config(
            PROFILE,
            temp.path(),
            &[("INTEGRATION_ON", "1"), ("MOODLE_SQL_1", "SELECT 1;")],
        );
        let store = StateStore::new(&config.state_dir, config.component());
        let db = MemoryDatabase::new();

        let outcome = Integrator::new(&config, &store, &db).integrate().await;
        assert!(matches!(outcome, IntegrationOutcome::Failed { .. }));
        assert!(db.scripts().is_empty());
    }
}
