//! Database access for probing, settings rows and integration scripts
//!
//! Components talk to the application database through the [`Database`] trait. The
//! production implementation, [`SqlDatabase`], runs on a `sqlx` `AnyPool` and therefore
//! accepts MySQL/MariaDB, PostgreSQL and SQLite URLs.
//!
//! Values are always bound as parameters. Table and column names cannot be bound, so they
//! only ever come from the profile and are checked by [`validate_identifier`].

pub mod url;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

use crate::config::{SettingKey, SettingsProfile};
use crate::error::{Result, database};

pub use url::{mask_password, resolve_url};

/// Bound on a single connection attempt, so one probe cannot block the wait loop for long
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Database: Send + Sync {
    /// Lightweight liveness query
    async fn probe(&self) -> Result<()>;

    /// Read a settings row value; `Ok(None)` when the row does not exist or is NULL
    async fn fetch_setting(
        &self,
        settings: &SettingsProfile,
        key: &SettingKey,
    ) -> Result<Option<String>>;

    /// Update the row addressed by `key`, inserting it when absent
    async fn upsert_setting(
        &self,
        settings: &SettingsProfile,
        key: &SettingKey,
        value: &str,
    ) -> Result<()>;

    /// Execute a multi-statement script as one unit of work
    async fn execute_script(&self, script: &str) -> Result<()>;

    /// Succeeds when `object` (a table or view) can be selected from
    async fn check_queryable(&self, object: &str) -> Result<()>;
}

/// Check that a profile-supplied name is safe to splice into SQL
///
/// Accepts `name` or `schema.name`, each part starting with a letter or `_` and
/// continuing with letters, digits or `_`.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = identifier.split('.').collect();
    if parts.len() <= 2 && parts.iter().all(|p| valid_part(p)) {
        Ok(())
    } else {
        Err(database::invalid_identifier(identifier))
    }
}

/// Placeholder style of the target database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `?` (MySQL, MariaDB, SQLite)
    Question,
    /// `$1, $2, ...` (PostgreSQL)
    Dollar,
}

impl Dialect {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Dialect::Dollar
        } else {
            Dialect::Question
        }
    }

    /// Placeholder for the `n`-th bound parameter (1-based)
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Question => "?".to_string(),
            Dialect::Dollar => format!("${n}"),
        }
    }
}

/// `WHERE` clause matching every key column, starting at parameter `first`
fn key_predicate(dialect: Dialect, key: &SettingKey, first: usize) -> String {
    key.columns()
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = {}", dialect.placeholder(first + i)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub(crate) fn select_setting_sql(
    dialect: Dialect,
    settings: &SettingsProfile,
    key: &SettingKey,
) -> String {
    format!(
        "SELECT {} FROM {} WHERE {}",
        settings.value_column,
        settings.table,
        key_predicate(dialect, key, 1)
    )
}

pub(crate) fn update_setting_sql(
    dialect: Dialect,
    settings: &SettingsProfile,
    key: &SettingKey,
) -> String {
    format!(
        "UPDATE {} SET {} = {} WHERE {}",
        settings.table,
        settings.value_column,
        dialect.placeholder(1),
        key_predicate(dialect, key, 2)
    )
}

pub(crate) fn insert_setting_sql(
    dialect: Dialect,
    settings: &SettingsProfile,
    key: &SettingKey,
) -> String {
    let columns: Vec<&str> = key
        .columns()
        .map(|(column, _)| column)
        .chain(std::iter::once(settings.value_column.as_str()))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len())
        .map(|n| dialect.placeholder(n))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        settings.table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn check_identifiers(settings: &SettingsProfile, key: &SettingKey) -> Result<()> {
    validate_identifier(&settings.table)?;
    validate_identifier(&settings.value_column)?;
    for (column, _) in key.columns() {
        validate_identifier(column)?;
    }
    Ok(())
}

/// [`Database`] backed by a `sqlx` any-driver pool
pub struct SqlDatabase {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlDatabase {
    /// Create a pool without connecting; every probe makes a fresh connection attempt
    pub fn connect_lazy(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(url)?;
        Ok(Self {
            pool,
            dialect: Dialect::from_url(url),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for SqlDatabase {
    async fn probe(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_setting(
        &self,
        settings: &SettingsProfile,
        key: &SettingKey,
    ) -> Result<Option<String>> {
        check_identifiers(settings, key)?;
        let sql = select_setting_sql(self.dialect, settings, key);
        let mut query = sqlx::query_scalar::<_, Option<String>>(&sql);
        for (_, value) in key.columns() {
            query = query.bind(value.to_string());
        }
        let value = query.fetch_optional(&self.pool).await?;
        Ok(value.flatten())
    }

    async fn upsert_setting(
        &self,
        settings: &SettingsProfile,
        key: &SettingKey,
        value: &str,
    ) -> Result<()> {
        check_identifiers(settings, key)?;
        let mut tx = self.pool.begin().await?;

        let select = select_setting_sql(self.dialect, settings, key);
        let mut exists = sqlx::query(&select);
        for (_, column_value) in key.columns() {
            exists = exists.bind(column_value.to_string());
        }
        let row = exists.fetch_optional(&mut *tx).await?;

        if row.is_some() {
            let update = update_setting_sql(self.dialect, settings, key);
            let mut query = sqlx::query(&update).bind(value.to_string());
            for (_, column_value) in key.columns() {
                query = query.bind(column_value.to_string());
            }
            query.execute(&mut *tx).await?;
        } else {
            let insert = insert_setting_sql(self.dialect, settings, key);
            let mut query = sqlx::query(&insert);
            for (_, column_value) in key.columns() {
                query = query.bind(column_value.to_string());
            }
            query.bind(value.to_string()).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<()> {
        sqlx::raw_sql(script).execute(&self.pool).await?;
        Ok(())
    }

    async fn check_queryable(&self, object: &str) -> Result<()> {
        validate_identifier(object)?;
        sqlx::query(&format!("SELECT * FROM {object} WHERE 1 = 0"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;

    fn gibbon_settings() -> SettingsProfile {
        SettingsProfile {
            table: "gibbonSetting".to_string(),
            value_column: "value".to_string(),
            entries: Vec::new(),
        }
    }

    fn absolute_url_key() -> SettingKey {
        SettingKey::new([("scope", "System"), ("name", "absoluteURL")])
    }

    #[test]
    fn test_validate_identifier() {
        for ok in ["gibbonSetting", "mdl_config", "_x1", "public.ir_config_parameter"] {
            assert!(validate_identifier(ok).is_ok(), "{ok} should be valid");
        }
        for bad in ["", "1table", "a b", "t;DROP", "a.b.c", "x'--", "a."] {
            assert!(
                matches!(
                    validate_identifier(bad),
                    Err(ProvisionError::InvalidIdentifier { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(Dialect::from_url("postgres://db/odoo"), Dialect::Dollar);
        assert_eq!(Dialect::from_url("postgresql://db/odoo"), Dialect::Dollar);
        assert_eq!(Dialect::from_url("mysql://db/gibbon"), Dialect::Question);
        assert_eq!(Dialect::from_url("sqlite::memory:"), Dialect::Question);
    }

    #[test]
    fn test_select_sql_uses_sorted_key_columns() {
        let sql = select_setting_sql(Dialect::Question, &gibbon_settings(), &absolute_url_key());
        assert_eq!(
            sql,
            "SELECT value FROM gibbonSetting WHERE name = ? AND scope = ?"
        );
    }

    #[test]
    fn test_update_sql_postgres_numbering() {
        let settings = SettingsProfile {
            table: "ir_config_parameter".to_string(),
            value_column: "value".to_string(),
            entries: Vec::new(),
        };
        let key = SettingKey::new([("key", "web.base.url")]);
        assert_eq!(
            update_setting_sql(Dialect::Dollar, &settings, &key),
            "UPDATE ir_config_parameter SET value = $1 WHERE key = $2"
        );
        assert_eq!(
            insert_setting_sql(Dialect::Dollar, &settings, &key),
            "INSERT INTO ir_config_parameter (key, value) VALUES ($1, $2)"
        );
    }

    #[test]
    fn test_values_never_spliced_into_sql() {
        let key = SettingKey::new([("name", "x'; DROP TABLE gibbonSetting; --")]);
        let sql = insert_setting_sql(Dialect::Question, &gibbon_settings(), &key);
        assert!(!sql.contains("DROP"));
    }

    async fn sqlite() -> SqlDatabase {
        let db = SqlDatabase::connect_lazy("sqlite::memory:").unwrap();
        db.execute_script(
            "CREATE TABLE gibbonSetting (scope TEXT NOT NULL, name TEXT NOT NULL, value TEXT);\n\n\
             INSERT INTO gibbonSetting (scope, name, value) VALUES ('System', 'absoluteURL', 'http://old');",
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_sqlite_probe_and_fetch() {
        let db = sqlite().await;
        db.probe().await.unwrap();
        let value = db
            .fetch_setting(&gibbon_settings(), &absolute_url_key())
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("http://old"));

        let missing = SettingKey::new([("scope", "System"), ("name", "organisationName")]);
        assert_eq!(
            db.fetch_setting(&gibbon_settings(), &missing).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_sqlite_upsert_updates_and_inserts() {
        let db = sqlite().await;
        let settings = gibbon_settings();

        db.upsert_setting(&settings, &absolute_url_key(), "https://school.example")
            .await
            .unwrap();
        let organisation = SettingKey::new([("scope", "System"), ("name", "organisationName")]);
        db.upsert_setting(&settings, &organisation, "Example School")
            .await
            .unwrap();

        assert_eq!(
            db.fetch_setting(&settings, &absolute_url_key())
                .await
                .unwrap()
                .as_deref(),
            Some("https://school.example")
        );
        assert_eq!(
            db.fetch_setting(&settings, &organisation)
                .await
                .unwrap()
                .as_deref(),
            Some("Example School")
        );
    }

    #[tokio::test]
    async fn test_sqlite_check_queryable() {
        let db = sqlite().await;
        db.check_queryable("gibbonSetting").await.unwrap();
        assert!(db.check_queryable("moodleUser").await.is_err());
        assert!(matches!(
            db.check_queryable("x; DROP TABLE gibbonSetting").await,
            Err(ProvisionError::InvalidIdentifier { .. })
        ));
    }
}
