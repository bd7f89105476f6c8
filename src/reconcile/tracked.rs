//! Change detection for the tracked base URL

use std::fmt;

/// What reading the persisted value produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousValue {
    Present(String),
    /// The value has never been written (first run)
    Absent,
    /// The read failed, so the previous value is unknown
    Unknown,
}

impl PreviousValue {
    /// Collapse a read result, keeping "never written" apart from "could not read"
    pub fn from_read<E>(read: std::result::Result<Option<String>, E>) -> Self {
        match read {
            Ok(Some(value)) => PreviousValue::Present(value),
            Ok(None) => PreviousValue::Absent,
            Err(_) => PreviousValue::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlChange {
    Unchanged,
    Changed { previous: String },
    FirstRun,
    /// Previous value unreadable; caches are left alone
    Undetermined,
}

impl UrlChange {
    pub fn invalidates_cache(&self) -> bool {
        matches!(self, UrlChange::Changed { .. } | UrlChange::FirstRun)
    }
}

impl fmt::Display for UrlChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlChange::Unchanged => f.write_str("unchanged"),
            UrlChange::Changed { previous } => write!(f, "changed from {previous}"),
            UrlChange::FirstRun => f.write_str("first run"),
            UrlChange::Undetermined => f.write_str("undetermined"),
        }
    }
}

pub fn detect_change(previous: &PreviousValue, desired: &str) -> UrlChange {
    match previous {
        PreviousValue::Present(value) if value == desired => UrlChange::Unchanged,
        PreviousValue::Present(value) => UrlChange::Changed {
            previous: value.clone(),
        },
        PreviousValue::Absent => UrlChange::FirstRun,
        PreviousValue::Unknown => UrlChange::Undetermined,
    }
}
