//! # Rolegate Core
//!
//! Pure types for the rolegate authorization engine: identifiers, directory
//! entities, and the role hierarchy closure.
//!
//! This crate contains no I/O and no storage. It is pure computation over
//! an organization's roles and grants.
//!
//! ## Key Types
//!
//! - [`Organization`], [`User`], [`Group`], [`Role`], [`Permission`] - directory entities
//! - [`ClosureEntry`] - one materialized `(role, permission)` entitlement
//! - [`RoleGraph`] - parent pointers plus direct grants, used to compute closures
//! - [`ClosureDigest`] - order-independent fingerprint of a closure table
//!
//! ## Inheritance
//!
//! A role inherits every permission of its ancestors. The parent relation
//! must be a forest; cycles are reported as [`IntegrityError::Cycle`].

pub mod closure;
pub mod entity;
pub mod error;
pub mod types;
pub mod validation;

pub use closure::{ClosureDigest, RoleGraph};
pub use entity::{ClosureEntry, Group, Organization, Permission, Role, User};
pub use error::{IntegrityError, InvalidIdentifier};
pub use types::{GroupId, IdKind, OrganizationId, PermissionId, RoleId, UserId};
pub use validation::{ensure_same_organization, OrganizationScoped};
