//! Installation state errors

use super::ProvisionError;

pub fn read_failed(path: impl Into<String>, reason: impl ToString) -> ProvisionError {
    ProvisionError::StateReadFailed {
        path: path.into(),
        reason: reason.to_string(),
    }
}

pub fn write_failed(path: impl Into<String>, reason: impl ToString) -> ProvisionError {
    ProvisionError::StateWriteFailed {
        path: path.into(),
        reason: reason.to_string(),
    }
}

pub fn not_installed(component: impl Into<String>, version: impl Into<String>) -> ProvisionError {
    ProvisionError::NotInstalled {
        component: component.into(),
        version: version.into(),
    }
}
