//! Database errors

use super::ProvisionError;

pub fn error(message: impl Into<String>) -> ProvisionError {
    ProvisionError::DatabaseError {
        message: message.into(),
    }
}

pub fn invalid_identifier(identifier: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidIdentifier {
        identifier: identifier.into(),
    }
}
