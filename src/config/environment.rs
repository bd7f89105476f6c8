//! Snapshot of the process environment
//!
//! Environment variables are the only runtime configuration channel. They are captured
//! once at process entry and passed explicitly to every component, so nothing below the
//! entry point reads `std::env` directly.

use std::collections::BTreeMap;

use crate::error::{ProvisionError, Result};

/// Values accepted as "enabled" for boolean flags
const TRUTHY: &[&str] = &["1", "true", "yes", "on"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the current process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a variable, treating an empty value as unset
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Get a variable or fail with [`ProvisionError::ConfigVariableMissing`]
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| ProvisionError::ConfigVariableMissing {
                variable: name.to_string(),
            })
    }

    /// Whether a flag variable is set to one of `1`, `true`, `yes`, `on` (any case)
    pub fn is_truthy(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| {
            let value = value.trim();
            TRUTHY.iter().any(|t| value.eq_ignore_ascii_case(t))
        })
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
