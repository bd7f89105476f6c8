//! Cache errors

use super::ProvisionError;

/// Creates a cache operation failed error
pub fn operation_failed(message: impl Into<String>) -> ProvisionError {
    ProvisionError::CacheOperationFailed {
        message: message.into(),
    }
}
