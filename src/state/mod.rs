//! Installation state store
//!
//! One JSON marker per installed version:
//!
//! ```text
//! <state_dir>/
//! ├── moodle-4.3.1.json   # earlier version, kept
//! └── moodle-4.3.2.json   # current version
//! ```
//!
//! A marker is written only after one-time setup succeeded. The integration record lives
//! inside the marker, so integration can never be recorded for a version that is not
//! installed. Old markers are never deleted; an upgrade simply finds no marker for the
//! new version and installs again.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::fs::{read_optional, write_atomic};
use crate::error::{Result, state};

const MARKER_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationMarker {
    pub component: String,
    pub version: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<IntegrationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRecord {
    pub completed_at: DateTime<Utc>,
    /// Number of fragments in the executed unit
    pub fragments: usize,
    /// BLAKE3 hex digest of the executed unit
    pub checksum: String,
}

/// Persisted state for one component version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    NotInstalled,
    Installed(InstallationMarker),
    IntegrationComplete(InstallationMarker),
}

impl InstallState {
    fn from_marker(marker: Option<InstallationMarker>) -> Self {
        match marker {
            None => InstallState::NotInstalled,
            Some(marker) if marker.integration.is_some() => {
                InstallState::IntegrationComplete(marker)
            }
            Some(marker) => InstallState::Installed(marker),
        }
    }

    pub fn is_installed(&self) -> bool {
        !matches!(self, InstallState::NotInstalled)
    }

    pub fn is_integrated(&self) -> bool {
        matches!(self, InstallState::IntegrationComplete(_))
    }

    pub fn marker(&self) -> Option<&InstallationMarker> {
        match self {
            InstallState::NotInstalled => None,
            InstallState::Installed(marker) | InstallState::IntegrationComplete(marker) => {
                Some(marker)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InstallState::NotInstalled => "not installed",
            InstallState::Installed(_) => "installed",
            InstallState::IntegrationComplete(_) => "installed, integration complete",
        }
    }
}

/// File-backed store of installation markers for one component
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
    component: String,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>, component: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            component: component.into(),
        }
    }

    pub fn marker_path(&self, version: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.{MARKER_EXTENSION}", self.component, version))
    }

    pub fn read(&self, version: &str) -> Result<InstallState> {
        Ok(InstallState::from_marker(self.read_marker(version)?))
    }

    fn read_marker(&self, version: &str) -> Result<Option<InstallationMarker>> {
        let path = self.marker_path(version);
        let display = path.display().to_string();
        let Some(content) = read_optional(&path).map_err(|e| state::read_failed(&display, e))?
        else {
            return Ok(None);
        };
        let marker: InstallationMarker =
            serde_json::from_str(&content).map_err(|e| state::read_failed(&display, e))?;
        if marker.component != self.component || marker.version != version {
            return Err(state::read_failed(
                display,
                format!(
                    "marker belongs to {} {}",
                    marker.component, marker.version
                ),
            ));
        }
        Ok(Some(marker))
    }

    /// Record a successful installation of `version`
    pub fn mark_installed(&self, version: &str) -> Result<InstallationMarker> {
        let marker = InstallationMarker {
            component: self.component.clone(),
            version: version.to_string(),
            installed_at: Utc::now(),
            integration: None,
        };
        self.write_marker(&marker)?;
        Ok(marker)
    }

    /// Attach an integration record to the marker of `version`
    ///
    /// Fails with [`crate::error::ProvisionError::NotInstalled`] when no marker exists.
    pub fn mark_integrated(
        &self,
        version: &str,
        fragments: usize,
        checksum: impl Into<String>,
    ) -> Result<InstallationMarker> {
        let Some(mut marker) = self.read_marker(version)? else {
            return Err(state::not_installed(&self.component, version));
        };
        marker.integration = Some(IntegrationRecord {
            completed_at: Utc::now(),
            fragments,
            checksum: checksum.into(),
        });
        self.write_marker(&marker)?;
        Ok(marker)
    }

    /// All markers of this component, oldest installation first
    pub fn markers(&self) -> Result<Vec<InstallationMarker>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(state::read_failed(self.dir.display().to_string(), e)),
        };

        let prefix = format!("{}-", self.component);
        let mut markers = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(version) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(&format!(".{MARKER_EXTENSION}")))
            else {
                continue;
            };
            if let Ok(Some(marker)) = self.read_marker(version) {
                markers.push(marker);
            }
        }
        markers.sort_by_key(|m| m.installed_at);
        Ok(markers)
    }

    fn write_marker(&self, marker: &InstallationMarker) -> Result<()> {
        let path = self.marker_path(&marker.version);
        let json = serde_json::to_vec_pretty(marker)
            .map_err(|e| state::write_failed(path.display().to_string(), e))?;
        write_atomic(&path, &json)
            .map_err(|e| state::write_failed(path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_store_is_not_installed() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().join("state"), "moodle");
        assert_eq!(store.read("4.3.2").unwrap(), InstallState::NotInstalled);
        assert!(store.markers().unwrap().is_empty());
    }

    #[test]
    fn test_mark_installed_then_read() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "moodle");
        let marker = store.mark_installed("4.3.2").unwrap();

        let state = store.read("4.3.2").unwrap();
        assert!(state.is_installed());
        assert!(!state.is_integrated());
        assert_eq!(state.marker(), Some(&marker));
        assert!(temp.path().join("moodle-4.3.2.json").is_file());
    }

    #[test]
    fn test_version_change_keeps_old_marker() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "odoo");
        store.mark_installed("16.0").unwrap();

        assert_eq!(store.read("17.0").unwrap(), InstallState::NotInstalled);
        store.mark_installed("17.0").unwrap();

        let versions: Vec<String> = store
            .markers()
            .unwrap()
            .into_iter()
            .map(|m| m.version)
            .collect();
        assert_eq!(versions.len(), 2);
        assert!(versions.contains(&"16.0".to_string()));
        assert!(versions.contains(&"17.0".to_string()));
    }

    #[test]
    fn test_mark_integrated_requires_installation() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "gibbon");
        let result = store.mark_integrated("26.0.00", 2, "abc");
        assert!(matches!(result, Err(ProvisionError::NotInstalled { .. })));
        assert!(!store.marker_path("26.0.00").exists());
    }

    #[test]
    fn test_mark_integrated_preserves_installation() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "gibbon");
        let installed = store.mark_installed("26.0.00").unwrap();
        store.mark_integrated("26.0.00", 3, "deadbeef").unwrap();

        let state = store.read("26.0.00").unwrap();
        assert!(state.is_integrated());
        let marker = state.marker().unwrap();
        assert_eq!(marker.installed_at, installed.installed_at);
        let record = marker.integration.as_ref().unwrap();
        assert_eq!(record.fragments, 3);
        assert_eq!(record.checksum, "deadbeef");
    }

    #[test]
    fn test_corrupt_marker_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "suitecrm");
        std::fs::write(store.marker_path("8.5"), "not json").unwrap();
        assert!(matches!(
            store.read("8.5"),
            Err(ProvisionError::StateReadFailed { .. })
        ));
    }

    #[test]
    fn test_marker_for_other_component_rejected() {
        let temp = TempDir::new().unwrap();
        StateStore::new(temp.path(), "limesurvey")
            .mark_installed("6.0")
            .unwrap();
        std::fs::rename(
            temp.path().join("limesurvey-6.0.json"),
            temp.path().join("moodle-6.0.json"),
        )
        .unwrap();
        let store = StateStore::new(temp.path(), "moodle");
        assert!(store.read("6.0").is_err());
    }

    #[test]
    fn test_other_components_ignored_in_listing() {
        let temp = TempDir::new().unwrap();
        StateStore::new(temp.path(), "moodle")
            .mark_installed("4.3.2")
            .unwrap();
        StateStore::new(temp.path(), "gibbon")
            .mark_installed("26.0.00")
            .unwrap();
        let markers = StateStore::new(temp.path(), "moodle").markers().unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].component, "moodle");
    }
}
