//! Profile errors

use super::ProvisionError;

/// Creates a profile not found error
pub fn not_found(path: impl Into<String>) -> ProvisionError {
    ProvisionError::ProfileNotFound { path: path.into() }
}

/// Creates a profile parse failed error
pub fn parse_failed(path: impl Into<String>, reason: impl Into<String>) -> ProvisionError {
    ProvisionError::ProfileParseFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates an invalid profile error
pub fn invalid(message: impl Into<String>) -> ProvisionError {
    ProvisionError::ProfileInvalid {
        message: message.into(),
    }
}
