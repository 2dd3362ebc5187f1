//! Store trait: the abstract interface to the directory.
//!
//! Every component receives its store explicitly; nothing holds a global
//! handle. Implementations include SQLite (primary) and in-memory (tests).

use async_trait::async_trait;
use rolegate_core::{
    ClosureDigest, ClosureEntry, Group, GroupId, IntegrityError, Organization, OrganizationId,
    Permission, PermissionId, Role, RoleGraph, RoleId, User, UserId,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of recording a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// The grant was recorded.
    Inserted,
    /// The grant already existed (idempotent, not an error).
    AlreadyExists,
}

/// Bookkeeping for the materialized closure of one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureState {
    pub organization_id: OrganizationId,
    /// Incremented by every successful replace.
    pub generation: u64,
    /// Structure revision the closure was computed from.
    pub source_revision: u64,
    pub entry_count: usize,
    pub digest: ClosureDigest,
    /// When the closure was replaced (Unix ms).
    pub rebuilt_at: i64,
}

/// Roles and role grants of one organization, read at a single revision.
#[derive(Debug, Clone)]
pub struct RoleGraphSnapshot {
    pub organization_id: OrganizationId,
    pub revision: u64,
    pub roles: Vec<Role>,
    pub grants: Vec<(RoleId, PermissionId)>,
}

impl RoleGraphSnapshot {
    /// Build the adjacency graph for closure computation.
    pub fn graph(&self) -> std::result::Result<RoleGraph, IntegrityError> {
        RoleGraph::new(self.organization_id, &self.roles, &self.grants)
    }
}

/// The Store trait: async interface to the directory and the closure table.
///
/// # Design Notes
///
/// - **Parameterized access**: all lookups take typed ids and bound values.
/// - **Tenancy**: writes reject references that cross organizations.
/// - **Structure revision**: every write that can change role to permission
///   reachability bumps the organization's revision, so a closure built
///   from an older revision is detectably stale.
/// - **Atomic replace**: `replace_closure` swaps an organization's whole
///   entry set; readers see the old set or the new one, never a mix.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Directory Reads
    // ─────────────────────────────────────────────────────────────────────────

    async fn organization(&self, id: &OrganizationId) -> Result<Option<Organization>>;

    async fn user(&self, id: &UserId) -> Result<Option<User>>;

    async fn group(&self, id: &GroupId) -> Result<Option<Group>>;

    async fn role(&self, id: &RoleId) -> Result<Option<Role>>;

    /// Look up a permission by its key within an organization.
    async fn permission_by_key(
        &self,
        organization_id: &OrganizationId,
        key: &str,
    ) -> Result<Option<Permission>>;

    async fn roles_in_organization(&self, organization_id: &OrganizationId) -> Result<Vec<Role>>;

    /// Whether the group holds a directly-assigned permission with this key.
    async fn group_has_permission_key(&self, group_id: &GroupId, key: &str) -> Result<bool>;

    /// Whether the role holds a directly-assigned permission with this key.
    async fn role_has_permission_key(&self, role_id: &RoleId, key: &str) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Administrative Writes
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_organization(&self, organization: &Organization) -> Result<()>;

    /// Set or clear the organization admin. The admin must be a member.
    async fn set_organization_admin(
        &self,
        organization_id: &OrganizationId,
        admin_id: Option<UserId>,
    ) -> Result<()>;

    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn insert_group(&self, group: &Group) -> Result<()>;

    async fn insert_role(&self, role: &Role) -> Result<()>;

    /// Re-point a role's parent. Cycles are not rejected here; they surface
    /// when the closure is rebuilt.
    async fn set_role_parent(&self, role_id: &RoleId, parent: Option<RoleId>) -> Result<()>;

    /// Insert a permission. A duplicate key in the same organization is a conflict.
    async fn insert_permission(&self, permission: &Permission) -> Result<()>;

    async fn grant_group_permission(
        &self,
        group_id: &GroupId,
        permission_id: &PermissionId,
    ) -> Result<InsertResult>;

    async fn grant_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<InsertResult>;

    /// Remove a direct role grant. Returns whether a grant was removed.
    async fn revoke_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<bool>;

    /// Current structure revision of an organization (0 if never mutated).
    async fn structure_revision(&self, organization_id: &OrganizationId) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Closure Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Read roles, role grants and revision consistently.
    ///
    /// Returns `None` if the organization does not exist.
    async fn role_graph_snapshot(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<RoleGraphSnapshot>>;

    /// Discard the organization's closure and install `entries` in one step.
    ///
    /// Every entry must belong to `organization_id`. Returns the new state.
    async fn replace_closure(
        &self,
        organization_id: &OrganizationId,
        entries: &[ClosureEntry],
        source_revision: u64,
        digest: ClosureDigest,
    ) -> Result<ClosureState>;

    /// Whether the materialized closure entitles `role_id` to `key`.
    async fn closure_grants(&self, role_id: &RoleId, key: &str) -> Result<bool>;

    /// All closure entries for an organization, sorted.
    async fn closure_entries(&self, organization_id: &OrganizationId)
        -> Result<Vec<ClosureEntry>>;

    async fn closure_state(&self, organization_id: &OrganizationId)
        -> Result<Option<ClosureState>>;
}
