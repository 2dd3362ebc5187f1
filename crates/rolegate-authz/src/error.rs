//! Error types for authorization and closure rebuilds.

use rolegate_core::{IntegrityError, InvalidIdentifier, OrganizationId};
use rolegate_store::StoreError;
use thiserror::Error;

/// Errors that can occur while deciding or rebuilding.
///
/// Missing users, roles, groups or permissions are not errors; they
/// resolve to a denied decision.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A caller-supplied argument is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Rebuild requested for an organization that does not exist.
    #[error("unknown organization: {0}")]
    UnknownOrganization(OrganizationId),

    /// The role hierarchy is corrupt (cycle, dangling or foreign parent).
    #[error("data integrity error: {0}")]
    DataIntegrity(#[from] IntegrityError),

    /// The store could not serve the request.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl From<StoreError> for AuthzError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Integrity(e) => AuthzError::DataIntegrity(e),
            other => AuthzError::StoreUnavailable(other),
        }
    }
}

impl From<InvalidIdentifier> for AuthzError {
    fn from(err: InvalidIdentifier) -> Self {
        AuthzError::InvalidArgument(err.to_string())
    }
}

/// Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_core::{IdKind, RoleId};

    #[test]
    fn test_store_integrity_becomes_data_integrity() {
        let role = RoleId::new();
        let err: AuthzError = StoreError::Integrity(IntegrityError::UnknownRole(role)).into();
        assert!(matches!(err, AuthzError::DataIntegrity(IntegrityError::UnknownRole(r)) if r == role));
    }

    #[test]
    fn test_other_store_errors_are_unavailable() {
        let err: AuthzError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, AuthzError::StoreUnavailable(_)));

        let err: AuthzError = StoreError::NotFound("role".into()).into();
        assert!(matches!(err, AuthzError::StoreUnavailable(_)));
    }

    #[test]
    fn test_invalid_identifier_is_invalid_argument() {
        let err: AuthzError = InvalidIdentifier::Empty { kind: IdKind::User }.into();
        assert!(matches!(err, AuthzError::InvalidArgument(_)));
    }
}
