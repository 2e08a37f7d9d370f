use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
///
/// The first two variants are infrastructure failures: they are logged and the
/// triggering client event is dropped without a client-visible error. The rest
/// are terminal for the triggering event and surfaced to the originating
/// connection only, as a structured error event.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Caller lacks the required identity or role.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Status code carried in the error event payload sent back to the client.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Unavailable(_) | ServiceError::Degraded => 503,
            ServiceError::Unauthorized(_) => 403,
            ServiceError::InvalidInput(_) => 400,
            ServiceError::NotFound(_) => 404,
        }
    }

    /// Whether this error is an infrastructure failure that must not be
    /// surfaced to the client.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_) | ServiceError::Degraded)
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_taxonomy() {
        assert_eq!(ServiceError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ServiceError::Unauthorized("x".into()).status_code(), 403);
        assert_eq!(ServiceError::InvalidInput("x".into()).status_code(), 400);
        assert_eq!(ServiceError::Degraded.status_code(), 503);
    }

    #[test]
    fn infrastructure_errors_are_not_client_visible() {
        assert!(ServiceError::Degraded.is_infrastructure());
        assert!(!ServiceError::NotFound("x".into()).is_infrastructure());
    }
}
