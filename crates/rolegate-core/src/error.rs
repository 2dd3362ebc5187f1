//! Error types for rolegate core.

use thiserror::Error;

use crate::types::{IdKind, OrganizationId, RoleId};

/// A caller-supplied identifier could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIdentifier {
    #[error("{kind} id is empty")]
    Empty { kind: IdKind },

    #[error("{kind} id is not a valid UUID: {value:?}")]
    Malformed { kind: IdKind, value: String },
}

/// Directory data violates a structural invariant.
///
/// These are never absorbed: a rebuild that hits one fails and leaves
/// the previous closure in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("role hierarchy cycle through {role}: {path:?}")]
    Cycle { role: RoleId, path: Vec<RoleId> },

    #[error("role {role} references parent {parent} which is not in the organization")]
    UnknownParent { role: RoleId, parent: RoleId },

    #[error("role {0} is not part of the organization's role set")]
    UnknownRole(RoleId),

    #[error("{entity} belongs to organization {found}, expected {expected}")]
    CrossOrganization {
        entity: String,
        expected: OrganizationId,
        found: OrganizationId,
    },
}
