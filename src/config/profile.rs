//! Application profile (`profile.yaml`)
//!
//! A profile is the static description of one deployment bundle: which database to wait
//! for, how to run the application's one-time setup, which configuration keys to
//! reconcile from the environment, and what to hand off to at the end. It is baked into
//! the image; everything that varies per deployment comes from the environment.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::database::validate_identifier;
use crate::error::{Result, profile};

/// Default location of persisted installation state
pub const DEFAULT_STATE_DIR: &str = "/var/lib/provisioner";

const DEFAULT_WAIT_ATTEMPTS: u32 = 30;
const DEFAULT_WAIT_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_SECRET_LENGTH: usize = 32;
const MIN_SECRET_LENGTH: usize = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Component name, used in marker file names
    pub name: String,
    /// Version of the packaged application; a new version triggers a new installation
    pub version: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub database: Option<DatabaseProfile>,
    #[serde(default)]
    pub install: Option<InstallProfile>,
    #[serde(default)]
    pub config_file: Option<ConfigFileProfile>,
    #[serde(default)]
    pub settings: Option<SettingsProfile>,
    #[serde(default)]
    pub base_url: Option<BaseUrlProfile>,
    #[serde(default)]
    pub integration: Option<IntegrationProfile>,
    /// Application command to hand off to
    #[serde(default)]
    pub exec: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Mysql,
    Postgres,
    Sqlite,
}

impl Driver {
    pub fn scheme(self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Postgres => "postgres",
            Driver::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseProfile {
    /// Variable holding a complete connection URL; takes precedence over the parts
    #[serde(default)]
    pub url_env: Option<String>,
    #[serde(default)]
    pub driver: Option<Driver>,
    #[serde(default)]
    pub host_env: Option<String>,
    #[serde(default)]
    pub port_env: Option<String>,
    #[serde(default)]
    pub name_env: Option<String>,
    #[serde(default)]
    pub user_env: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default)]
    pub wait: WaitPolicy,
}

/// Bounded fixed-delay retry policy for the dependency wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitPolicy {
    #[serde(default = "default_wait_attempts")]
    pub attempts: u32,
    #[serde(
        default = "default_wait_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub delay: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_WAIT_ATTEMPTS,
            delay: DEFAULT_WAIT_DELAY,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallProfile {
    /// Setup command (program followed by arguments); empty means marker-only
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub secrets: Vec<SecretSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretSpec {
    pub env: String,
    #[serde(default = "default_secret_length")]
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigFormat {
    /// `$key = 'value';` and `$CFG->key = 'value';`
    PhpVariable,
    /// `'key' => 'value',`
    PhpArray,
    /// `define('KEY', 'value');`
    PhpDefine,
    /// `key = value`
    Ini,
    /// `KEY=value`
    Dotenv,
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigFormat::PhpVariable => "php_variable",
            ConfigFormat::PhpArray => "php_array",
            ConfigFormat::PhpDefine => "php_define",
            ConfigFormat::Ini => "ini",
            ConfigFormat::Dotenv => "dotenv",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileProfile {
    pub path: PathBuf,
    pub format: ConfigFormat,
    #[serde(default)]
    pub entries: Vec<FileEntry>,
}

/// A recognized config file key and the variable that supplies its value
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub key: String,
    pub env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsProfile {
    pub table: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    #[serde(default)]
    pub entries: Vec<SettingEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingEntry {
    pub key: SettingKey,
    pub env: String,
}

/// Column/value pairs addressing one settings row, e.g. `{scope: System, name: absoluteURL}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SettingKey(pub BTreeMap<String, String>);

impl SettingKey {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.columns().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&parts.join(","))
    }
}

/// The externally visible base URL, tracked for change detection
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseUrlProfile {
    pub env: String,
    pub target: TrackedTarget,
    pub cache_dir: PathBuf,
}

/// Where the tracked value is persisted; exactly one of the fields is set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackedTarget {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub setting: Option<SettingKey>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrationProfile {
    pub enabled_env: String,
    pub fragment_prefix: String,
    /// Tables or views that must be queryable once the fragments ran
    #[serde(default)]
    pub verify: Vec<String>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn default_wait_attempts() -> u32 {
    DEFAULT_WAIT_ATTEMPTS
}

fn default_wait_delay() -> Duration {
    DEFAULT_WAIT_DELAY
}

fn default_secret_length() -> usize {
    DEFAULT_SECRET_LENGTH
}

fn default_value_column() -> String {
    "value".to_string()
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

impl Profile {
    /// Load and validate a profile from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                profile::not_found(&display)
            } else {
                profile::parse_failed(&display, e.to_string())
            }
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            crate::error::ProvisionError::ProfileParseFailed { reason, .. } => {
                profile::parse_failed(display, reason)
            }
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let profile: Profile = serde_yaml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Check the invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        validate_file_component("name", &self.name)?;
        validate_file_component("version", &self.version)?;

        if let Some(database) = &self.database {
            if database.wait.attempts == 0 {
                return Err(profile::invalid("database.wait.attempts must be at least 1"));
            }
            if database.url_env.is_none() && database.driver.is_none() {
                return Err(profile::invalid(
                    "database needs either url_env or driver with host/name/user variables",
                ));
            }
        }

        if let Some(install) = &self.install {
            for secret in &install.secrets {
                if secret.length < MIN_SECRET_LENGTH {
                    return Err(profile::invalid(format!(
                        "secret '{}' must be at least {MIN_SECRET_LENGTH} characters",
                        secret.env
                    )));
                }
            }
        }

        if let Some(settings) = &self.settings {
            if self.database.is_none() {
                return Err(profile::invalid("settings require a database section"));
            }
            validate_identifier(&settings.table)?;
            validate_identifier(&settings.value_column)?;
            for entry in &settings.entries {
                validate_setting_key(&entry.key)?;
            }
        }

        if let Some(base_url) = &self.base_url {
            match (&base_url.target.file, &base_url.target.setting) {
                (Some(_), None) => {
                    if self.config_file.is_none() {
                        return Err(profile::invalid(
                            "base_url.target.file requires a config_file section",
                        ));
                    }
                }
                (None, Some(key)) => {
                    if self.settings.is_none() {
                        return Err(profile::invalid(
                            "base_url.target.setting requires a settings section",
                        ));
                    }
                    validate_setting_key(key)?;
                }
                _ => {
                    return Err(profile::invalid(
                        "base_url.target must set exactly one of 'file' or 'setting'",
                    ));
                }
            }
        }

        if let Some(integration) = &self.integration {
            if self.database.is_none() {
                return Err(profile::invalid("integration requires a database section"));
            }
            if integration.fragment_prefix.is_empty() {
                return Err(profile::invalid(
                    "integration.fragment_prefix must not be empty",
                ));
            }
            for object in &integration.verify {
                validate_identifier(object)?;
            }
        }

        Ok(())
    }
}

fn validate_setting_key(key: &SettingKey) -> Result<()> {
    if key.is_empty() {
        return Err(profile::invalid("setting key must name at least one column"));
    }
    for (column, _) in key.columns() {
        validate_identifier(column)?;
    }
    Ok(())
}

fn validate_file_component(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(profile::invalid(format!("{field} must not be empty")));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+');
    if !value.chars().all(allowed) {
        return Err(profile::invalid(format!(
            "{field} '{value}' may only contain letters, digits, '.', '-', '_' and '+'"
        )));
    }
    Ok(())
}
