//! Error types and handling for the provisioner
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`profile`]: Profile loading and validation errors
//! - [`state`]: Installation state store errors
//! - [`fs`]: File system errors
//! - [`cache`]: Cache errors
//! - [`database`]: Database errors
//!
//! Only [`ProvisionError::DependencyUnavailable`], [`ProvisionError::InstallationFailed`]
//! and the ambient profile/state/hand-off errors abort startup. The reconciliation and
//! integration variants are logged as warnings by their callers and swallowed.

pub mod cache;
pub mod database;
pub mod fs;
pub mod profile;
pub mod state;


use miette::Diagnostic;
use thiserror::Error;

/// Main error type for provisioner operations
#[derive(Error, Diagnostic, Debug)]
pub enum ProvisionError {
    // Dependency errors
    #[error("Dependency '{target}' still unavailable after {attempts} attempts")]
    #[diagnostic(
        code(provisioner::dependency::unavailable),
        help("Check that the database container is running and the credentials are correct")
    )]
    DependencyUnavailable { target: String, attempts: u32 },

    // Installation errors
    #[error("Installation of {component} {version} failed: {reason}")]
    #[diagnostic(
        code(provisioner::install::failed),
        help("The installation marker was not written; setup will be retried on the next start")
    )]
    InstallationFailed {
        component: String,
        version: String,
        reason: String,
    },

    // Reconciliation errors
    #[error("Environment variable '{variable}' is not set")]
    #[diagnostic(code(provisioner::reconcile::variable_missing))]
    ConfigVariableMissing { variable: String },

    #[error("Failed to read persisted value for '{key}': {reason}")]
    #[diagnostic(code(provisioner::reconcile::query_failed))]
    ReconciliationQueryFailed { key: String, reason: String },

    // Integration errors
    #[error("Integration failed: {reason}")]
    #[diagnostic(
        code(provisioner::integration::failed),
        help("Integration will be retried on the next start")
    )]
    IntegrationFailed { reason: String },

    // Profile errors
    #[error("Profile not found: {path}")]
    #[diagnostic(
        code(provisioner::profile::not_found),
        help("Pass --profile or set PROVISIONER_PROFILE")
    )]
    ProfileNotFound { path: String },

    #[error("Failed to parse profile: {path}: {reason}")]
    #[diagnostic(code(provisioner::profile::parse_failed))]
    ProfileParseFailed { path: String, reason: String },

    #[error("Invalid profile: {message}")]
    #[diagnostic(code(provisioner::profile::invalid))]
    ProfileInvalid { message: String },

    // State errors
    #[error("Failed to read installation state: {path}: {reason}")]
    #[diagnostic(code(provisioner::state::read_failed))]
    StateReadFailed { path: String, reason: String },

    #[error("Failed to write installation state: {path}: {reason}")]
    #[diagnostic(code(provisioner::state::write_failed))]
    StateWriteFailed { path: String, reason: String },

    #[error("{component} {version} is not installed")]
    #[diagnostic(code(provisioner::state::not_installed))]
    NotInstalled { component: String, version: String },

    // File system errors
    #[error("Failed to read file: {path}: {reason}")]
    #[diagnostic(code(provisioner::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}: {reason}")]
    #[diagnostic(code(provisioner::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(provisioner::fs::io_error))]
    IoError { message: String },

    // Cache errors
    #[error("Cache operation failed: {message}")]
    #[diagnostic(code(provisioner::cache::operation_failed))]
    CacheOperationFailed { message: String },

    // Database errors
    #[error("Database error: {message}")]
    #[diagnostic(code(provisioner::database::error))]
    DatabaseError { message: String },

    #[error("Invalid SQL identifier: '{identifier}'")]
    #[diagnostic(
        code(provisioner::database::invalid_identifier),
        help("Identifiers may contain letters, digits, '_' and '.', and must not start with a digit")
    )]
    InvalidIdentifier { identifier: String },

    // Hand-off errors
    #[error("Failed to start '{program}': {reason}")]
    #[diagnostic(code(provisioner::handoff::failed))]
    HandoffFailed { program: String, reason: String },

    #[error("No application command to hand off to")]
    #[diagnostic(
        code(provisioner::handoff::no_command),
        help("Set 'exec' in the profile, pass a command after '--', or use --no-exec")
    )]
    NoCommand,
}

impl From<std::io::Error> for ProvisionError {
    fn from(err: std::io::Error) -> Self {
        ProvisionError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ProvisionError {
    fn from(err: serde_yaml::Error) -> Self {
        ProvisionError::ProfileParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionError::StateReadFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for ProvisionError {
    fn from(err: sqlx::Error) -> Self {
        ProvisionError::DatabaseError {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, ProvisionError>;
