//! Error types for the Gate.

use rolegate_authz::AuthzError;
use rolegate_core::{IntegrityError, InvalidIdentifier};
use rolegate_store::StoreError;
use thiserror::Error;

/// Errors surfaced to callers of the [`Gate`](crate::Gate).
#[derive(Debug, Error)]
pub enum GateError {
    /// Malformed identifier, or a rebuild for an organization that does not exist.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The role hierarchy is corrupt; the rebuild was not applied.
    #[error("data integrity error: {0}")]
    DataIntegrity(#[from] IntegrityError),

    /// The store could not serve the request. Not retried here.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<AuthzError> for GateError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InvalidArgument(msg) => GateError::InvalidArgument(msg),
            AuthzError::UnknownOrganization(id) => {
                GateError::InvalidArgument(format!("unknown organization {id}"))
            }
            AuthzError::DataIntegrity(e) => GateError::DataIntegrity(e),
            AuthzError::StoreUnavailable(e) => GateError::StoreUnavailable(e),
        }
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        AuthzError::from(err).into()
    }
}

impl From<InvalidIdentifier> for GateError {
    fn from(err: InvalidIdentifier) -> Self {
        GateError::InvalidArgument(err.to_string())
    }
}

/// Result type for Gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
