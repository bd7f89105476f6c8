//! Per-start configuration reconciliation
//!
//! This module handles:
//! - Rewriting recognized keys of the application's config file from the environment
//!   ([`format`])
//! - Upserting recognized settings rows in the application database
//! - Tracking the base URL and clearing the application cache when it changes
//!   ([`tracked`])
//!
//! Everything here is non-fatal except failing to read or write the config file itself:
//! a missing variable or a failed settings query is logged, recorded in the
//! [`ReconcileReport`] and skipped.

pub mod format;
pub mod tracked;

use crate::cache;
use crate::common::fs::{read_optional, write_atomic};
use crate::config::{
    BaseUrlProfile, ConfigFileProfile, Environment, RunConfig, SettingKey, SettingsProfile,
};
use crate::database::Database;
use crate::error::{ProvisionError, Result, database};
use crate::state::StateStore;

use format::{ConfigDocument, SetOutcome};
use tracked::{PreviousValue, UrlChange, detect_change};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrlOutcome {
    pub url: String,
    pub change: UrlChange,
    pub cache_entries_removed: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Config file keys whose line was replaced or appended
    pub file_updates: Vec<String>,
    /// The config file did not exist
    pub file_skipped: bool,
    /// Settings rows that were upserted, rendered as `k=v` keys
    pub settings_written: Vec<String>,
    /// Settings were not touched: no database connection or application not installed
    pub settings_skipped: bool,
    pub base_url: Option<BaseUrlOutcome>,
    pub warnings: Vec<String>,
}

impl ReconcileReport {
    fn warn(&mut self, err: &ProvisionError) {
        tracing::warn!(error = %err, "reconciliation warning");
        self.warnings.push(err.to_string());
    }
}

pub struct Reconciler<'a> {
    config: &'a RunConfig,
    db: Option<&'a dyn Database>,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a RunConfig, db: Option<&'a dyn Database>) -> Self {
        Self { config, db }
    }

    /// Bring persisted configuration in line with the environment
    ///
    /// The previous base URL is read before anything is written, so change detection
    /// always compares against what the last start left behind. The cache is only
    /// cleared once the new value has actually been stored.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let profile = &self.config.profile;
        let mut report = ReconcileReport::default();

        let desired_url = profile
            .base_url
            .as_ref()
            .and_then(|base_url| match self.config.env.require(&base_url.env) {
                Ok(url) => Some(url.to_string()),
                Err(err) => {
                    report.warn(&err);
                    None
                }
            });

        let mut previous = None;

        if let Some(config_file) = &profile.config_file {
            let tracked_key = profile
                .base_url
                .as_ref()
                .and_then(|b| b.target.file.as_deref())
                .zip(desired_url.as_deref());
            self.reconcile_file(config_file, tracked_key, &mut previous, &mut report)?;
        }

        if let Some(settings) = &profile.settings {
            match self.db {
                Some(db) if self.application_installed()? => {
                    let tracked_key = profile
                        .base_url
                        .as_ref()
                        .and_then(|b| b.target.setting.as_ref())
                        .zip(desired_url.as_deref());
                    Self::reconcile_settings(
                        db,
                        &self.config.env,
                        settings,
                        tracked_key,
                        &mut previous,
                        &mut report,
                    )
                    .await;
                }
                Some(_) => {
                    tracing::info!("application not installed, skipping settings reconciliation");
                    report.settings_skipped = true;
                }
                None => {
                    tracing::info!("no database connection, skipping settings reconciliation");
                    report.settings_skipped = true;
                }
            }
        }

        if let (Some(base_url), Some(url), Some(previous)) =
            (&profile.base_url, desired_url, previous)
        {
            let outcome = invalidate_on_change(base_url, url, &previous, &mut report);
            report.base_url = Some(outcome);
        }

        Ok(report)
    }

    fn application_installed(&self) -> Result<bool> {
        let store = StateStore::new(&self.config.state_dir, self.config.component());
        Ok(store.read(self.config.version())?.is_installed())
    }

    fn reconcile_file(
        &self,
        config_file: &ConfigFileProfile,
        tracked: Option<(&str, &str)>,
        previous: &mut Option<PreviousValue>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let path = &config_file.path;
        let Some(original) = read_optional(path)? else {
            tracing::info!(path = %path.display(), "config file does not exist, skipping");
            report.file_skipped = true;
            return Ok(());
        };

        let mut doc = ConfigDocument::parse(config_file.format, &original);

        if let Some((key, _)) = tracked {
            *previous = Some(doc.get(key).map_or(PreviousValue::Absent, PreviousValue::Present));
        }

        for entry in &config_file.entries {
            match self.config.env.require(&entry.env) {
                Ok(value) => {
                    apply(&mut doc, config_file, &entry.key, value, report);
                }
                Err(err) => report.warn(&err),
            }
        }
        if let Some((key, url)) = tracked {
            if !apply(&mut doc, config_file, key, url, report) {
                // the URL was not stored, so the cache stays
                *previous = Some(PreviousValue::Unknown);
            }
        }

        let rendered = doc.render();
        if rendered == original {
            tracing::debug!(path = %path.display(), "config file already up to date");
            return Ok(());
        }
        write_atomic(path, rendered.as_bytes())?;
        tracing::info!(
            path = %path.display(),
            keys = ?report.file_updates,
            "config file updated"
        );
        Ok(())
    }

    async fn reconcile_settings(
        db: &dyn Database,
        env: &Environment,
        settings: &SettingsProfile,
        tracked: Option<(&SettingKey, &str)>,
        previous: &mut Option<PreviousValue>,
        report: &mut ReconcileReport,
    ) {
        if let Some((key, _)) = tracked {
            let read = db.fetch_setting(settings, key).await;
            if let Err(err) = &read {
                report.warn(&ProvisionError::ReconciliationQueryFailed {
                    key: key.to_string(),
                    reason: err.to_string(),
                });
            }
            *previous = Some(PreviousValue::from_read(read));
        }

        for entry in &settings.entries {
            match env.require(&entry.env) {
                Ok(value) => {
                    write_setting(db, settings, &entry.key, value, report).await;
                }
                Err(err) => report.warn(&err),
            }
        }

        if let Some((key, url)) = tracked {
            if !write_setting(db, settings, key, url, report).await {
                *previous = Some(PreviousValue::Unknown);
            }
        }
    }
}

/// Upsert one settings row, returning whether it was stored
async fn write_setting(
    db: &dyn Database,
    settings: &SettingsProfile,
    key: &SettingKey,
    value: &str,
    report: &mut ReconcileReport,
) -> bool {
    match db.upsert_setting(settings, key, value).await {
        Ok(()) => {
            tracing::debug!(table = %settings.table, key = %key, "setting written");
            report.settings_written.push(key.to_string());
            true
        }
        Err(err) => {
            report.warn(&database::error(format!(
                "Failed to write setting {key} in {}: {err}",
                settings.table
            )));
            false
        }
    }
}

fn apply(
    doc: &mut ConfigDocument,
    config_file: &ConfigFileProfile,
    key: &str,
    value: &str,
    report: &mut ReconcileReport,
) -> bool {
    match doc.set(key, value) {
        SetOutcome::Replaced | SetOutcome::Appended => {
            report.file_updates.push(key.to_string());
            true
        }
        SetOutcome::Unchanged => true,
        SetOutcome::KeyNotFound => {
            let message = format!(
                "Key '{key}' not found in {} ({}), skipping",
                config_file.path.display(),
                config_file.format
            );
            tracing::warn!(key, path = %config_file.path.display(), "config key not found, skipping");
            report.warnings.push(message);
            false
        }
    }
}

fn invalidate_on_change(
    base_url: &BaseUrlProfile,
    url: String,
    previous: &PreviousValue,
    report: &mut ReconcileReport,
) -> BaseUrlOutcome {
    let change = detect_change(previous, &url);
    let mut cache_entries_removed = 0;

    if change.invalidates_cache() {
        tracing::info!(url = %url, change = %change, "base URL changed, clearing cache");
        match cache::clear(&base_url.cache_dir) {
            Ok(removed) => cache_entries_removed = removed,
            Err(err) => report.warn(&err),
        }
    } else {
        tracing::debug!(url = %url, change = %change, "base URL not changed");
    }

    BaseUrlOutcome {
        url,
        change,
        cache_entries_removed,
    }
}
