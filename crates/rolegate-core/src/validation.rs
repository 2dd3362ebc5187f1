//! Cross-organization reference checks.
//!
//! Stores call these before persisting a reference so that no user, role
//! or grant can point into another tenant.

use crate::entity::{Group, Permission, Role, User};
use crate::error::IntegrityError;
use crate::types::OrganizationId;

/// Anything that lives inside exactly one organization.
pub trait OrganizationScoped {
    fn organization_id(&self) -> OrganizationId;

    /// Short label used in error messages.
    fn describe(&self) -> String;
}

impl OrganizationScoped for User {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn describe(&self) -> String {
        format!("user {}", self.id)
    }
}

impl OrganizationScoped for Group {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn describe(&self) -> String {
        format!("group {}", self.id)
    }
}

impl OrganizationScoped for Role {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn describe(&self) -> String {
        format!("role {}", self.id)
    }
}

impl OrganizationScoped for Permission {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn describe(&self) -> String {
        format!("permission {:?}", self.key)
    }
}

/// Check that `referenced` lives in `expected`.
pub fn ensure_same_organization<T: OrganizationScoped + ?Sized>(
    expected: OrganizationId,
    referenced: &T,
) -> Result<(), IntegrityError> {
    let found = referenced.organization_id();
    if found != expected {
        return Err(IntegrityError::CrossOrganization {
            entity: referenced.describe(),
            expected,
            found,
        });
    }
    Ok(())
}
