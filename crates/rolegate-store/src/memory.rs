//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use rolegate_core::{
    ensure_same_organization, ClosureDigest, ClosureEntry, Group, GroupId, IntegrityError,
    Organization, OrganizationId, Permission, PermissionId, Role, RoleId, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::traits::{ClosureState, InsertResult, RoleGraphSnapshot, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; a
/// closure replace happens under one write guard, so readers never see a
/// partially replaced table.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    organizations: HashMap<OrganizationId, Organization>,
    users: HashMap<UserId, User>,
    groups: HashMap<GroupId, Group>,
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,

    /// Unique index: (organization, key) -> permission.
    permission_keys: HashMap<(OrganizationId, String), PermissionId>,

    group_permissions: HashMap<GroupId, BTreeSet<PermissionId>>,
    role_permissions: HashMap<RoleId, BTreeSet<PermissionId>>,

    revisions: HashMap<OrganizationId, u64>,
    closures: HashMap<OrganizationId, StoredClosure>,
}

struct StoredClosure {
    entries: BTreeSet<ClosureEntry>,
    by_role: HashMap<RoleId, BTreeSet<PermissionId>>,
    state: ClosureState,
}

impl MemoryStoreInner {
    fn bump_revision(&mut self, organization_id: OrganizationId) {
        *self.revisions.entry(organization_id).or_insert(0) += 1;
    }

    fn require_organization(&self, id: &OrganizationId) -> Result<&Organization> {
        self.organizations
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("organization {id}")))
    }

    fn require_role(&self, id: &RoleId) -> Result<&Role> {
        self.roles
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    fn require_permission(&self, id: &PermissionId) -> Result<&Permission> {
        self.permissions
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("permission {id}")))
    }

    fn permission_id_for_key(&self, organization_id: OrganizationId, key: &str) -> Option<PermissionId> {
        self.permission_keys
            .get(&(organization_id, key.to_string()))
            .copied()
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("memory store lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("memory store lock poisoned: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn organization(&self, id: &OrganizationId) -> Result<Option<Organization>> {
        Ok(self.read()?.organizations.get(id).cloned())
    }

    async fn user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn group(&self, id: &GroupId) -> Result<Option<Group>> {
        Ok(self.read()?.groups.get(id).cloned())
    }

    async fn role(&self, id: &RoleId) -> Result<Option<Role>> {
        Ok(self.read()?.roles.get(id).cloned())
    }

    async fn permission_by_key(
        &self,
        organization_id: &OrganizationId,
        key: &str,
    ) -> Result<Option<Permission>> {
        let inner = self.read()?;
        Ok(inner
            .permission_id_for_key(*organization_id, key)
            .and_then(|id| inner.permissions.get(&id).cloned()))
    }

    async fn roles_in_organization(&self, organization_id: &OrganizationId) -> Result<Vec<Role>> {
        let inner = self.read()?;
        let mut roles: Vec<Role> = inner
            .roles
            .values()
            .filter(|r| &r.organization_id == organization_id)
            .cloned()
            .collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn group_has_permission_key(&self, group_id: &GroupId, key: &str) -> Result<bool> {
        let inner = self.read()?;
        let Some(group) = inner.groups.get(group_id) else {
            return Ok(false);
        };
        let Some(permission_id) = inner.permission_id_for_key(group.organization_id, key) else {
            return Ok(false);
        };
        Ok(inner
            .group_permissions
            .get(group_id)
            .is_some_and(|set| set.contains(&permission_id)))
    }

    async fn role_has_permission_key(&self, role_id: &RoleId, key: &str) -> Result<bool> {
        let inner = self.read()?;
        let Some(role) = inner.roles.get(role_id) else {
            return Ok(false);
        };
        let Some(permission_id) = inner.permission_id_for_key(role.organization_id, key) else {
            return Ok(false);
        };
        Ok(inner
            .role_permissions
            .get(role_id)
            .is_some_and(|set| set.contains(&permission_id)))
    }

    async fn insert_organization(&self, organization: &Organization) -> Result<()> {
        let mut inner = self.write()?;
        if inner.organizations.contains_key(&organization.id) {
            return Err(StoreError::Conflict(format!(
                "organization {} already exists",
                organization.id
            )));
        }
        if organization.admin_id.is_some() {
            // The admin must be a member, and no member can exist yet.
            return Err(StoreError::NotFound(format!(
                "admin of new organization {}",
                organization.id
            )));
        }
        inner.organizations.insert(organization.id, organization.clone());
        Ok(())
    }

    async fn set_organization_admin(
        &self,
        organization_id: &OrganizationId,
        admin_id: Option<UserId>,
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner.require_organization(organization_id)?;
        if let Some(admin) = admin_id {
            let user = inner
                .users
                .get(&admin)
                .ok_or_else(|| StoreError::NotFound(format!("user {admin}")))?;
            ensure_same_organization(*organization_id, user)?;
        }
        if let Some(org) = inner.organizations.get_mut(organization_id) {
            org.admin_id = admin_id;
        }
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.write()?;
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        inner.require_organization(&user.organization_id)?;
        if let Some(group_id) = user.group_id {
            let group = inner
                .groups
                .get(&group_id)
                .ok_or_else(|| StoreError::NotFound(format!("group {group_id}")))?;
            ensure_same_organization(user.organization_id, group)?;
        }
        if let Some(role_id) = user.role_id {
            let role = inner.require_role(&role_id)?;
            ensure_same_organization(user.organization_id, role)?;
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_group(&self, group: &Group) -> Result<()> {
        let mut inner = self.write()?;
        if inner.groups.contains_key(&group.id) {
            return Err(StoreError::Conflict(format!("group {} already exists", group.id)));
        }
        inner.require_organization(&group.organization_id)?;
        inner.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn insert_role(&self, role: &Role) -> Result<()> {
        let mut inner = self.write()?;
        if inner.roles.contains_key(&role.id) {
            return Err(StoreError::Conflict(format!("role {} already exists", role.id)));
        }
        inner.require_organization(&role.organization_id)?;
        if let Some(parent_id) = role.parent_role_id {
            let parent = inner.require_role(&parent_id)?;
            ensure_same_organization(role.organization_id, parent)?;
        }
        inner.roles.insert(role.id, role.clone());
        inner.bump_revision(role.organization_id);
        Ok(())
    }

    async fn set_role_parent(&self, role_id: &RoleId, parent: Option<RoleId>) -> Result<()> {
        let mut inner = self.write()?;
        let organization_id = inner.require_role(role_id)?.organization_id;
        if let Some(parent_id) = parent {
            let parent_role = inner.require_role(&parent_id)?;
            ensure_same_organization(organization_id, parent_role)?;
        }
        if let Some(role) = inner.roles.get_mut(role_id) {
            role.parent_role_id = parent;
        }
        inner.bump_revision(organization_id);
        Ok(())
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<()> {
        let mut inner = self.write()?;
        if inner.permissions.contains_key(&permission.id) {
            return Err(StoreError::Conflict(format!(
                "permission {} already exists",
                permission.id
            )));
        }
        inner.require_organization(&permission.organization_id)?;
        let index_key = (permission.organization_id, permission.key.clone());
        if inner.permission_keys.contains_key(&index_key) {
            return Err(StoreError::Conflict(format!(
                "permission key {:?} already exists in organization {}",
                permission.key, permission.organization_id
            )));
        }
        inner.permission_keys.insert(index_key, permission.id);
        inner.permissions.insert(permission.id, permission.clone());
        inner.bump_revision(permission.organization_id);
        Ok(())
    }

    async fn grant_group_permission(
        &self,
        group_id: &GroupId,
        permission_id: &PermissionId,
    ) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let group = inner
            .groups
            .get(group_id)
            .ok_or_else(|| StoreError::NotFound(format!("group {group_id}")))?;
        let permission = inner.require_permission(permission_id)?;
        ensure_same_organization(group.organization_id, permission)?;

        let inserted = inner
            .group_permissions
            .entry(*group_id)
            .or_default()
            .insert(*permission_id);
        Ok(if inserted {
            InsertResult::Inserted
        } else {
            InsertResult::AlreadyExists
        })
    }

    async fn grant_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let organization_id = inner.require_role(role_id)?.organization_id;
        let permission = inner.require_permission(permission_id)?;
        ensure_same_organization(organization_id, permission)?;

        let inserted = inner
            .role_permissions
            .entry(*role_id)
            .or_default()
            .insert(*permission_id);
        if !inserted {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.bump_revision(organization_id);
        Ok(InsertResult::Inserted)
    }

    async fn revoke_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        let organization_id = inner.require_role(role_id)?.organization_id;
        let removed = inner
            .role_permissions
            .get_mut(role_id)
            .is_some_and(|set| set.remove(permission_id));
        if removed {
            inner.bump_revision(organization_id);
        }
        Ok(removed)
    }

    async fn structure_revision(&self, organization_id: &OrganizationId) -> Result<u64> {
        Ok(self
            .read()?
            .revisions
            .get(organization_id)
            .copied()
            .unwrap_or(0))
    }

    async fn role_graph_snapshot(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<RoleGraphSnapshot>> {
        let inner = self.read()?;
        if !inner.organizations.contains_key(organization_id) {
            return Ok(None);
        }

        let mut roles: Vec<Role> = inner
            .roles
            .values()
            .filter(|r| &r.organization_id == organization_id)
            .cloned()
            .collect();
        roles.sort_by_key(|r| r.id);

        let role_permissions = &inner.role_permissions;
        let grants = roles
            .iter()
            .flat_map(|role| {
                role_permissions
                    .get(&role.id)
                    .into_iter()
                    .flatten()
                    .map(move |permission_id| (role.id, *permission_id))
            })
            .collect();

        Ok(Some(RoleGraphSnapshot {
            organization_id: *organization_id,
            revision: inner.revisions.get(organization_id).copied().unwrap_or(0),
            roles,
            grants,
        }))
    }

    async fn replace_closure(
        &self,
        organization_id: &OrganizationId,
        entries: &[ClosureEntry],
        source_revision: u64,
        digest: ClosureDigest,
    ) -> Result<ClosureState> {
        let mut inner = self.write()?;
        inner.require_organization(organization_id)?;

        let mut set = BTreeSet::new();
        let mut by_role: HashMap<RoleId, BTreeSet<PermissionId>> = HashMap::new();
        for entry in entries {
            if &entry.organization_id != organization_id {
                return Err(IntegrityError::CrossOrganization {
                    entity: format!("closure entry for role {}", entry.role_id),
                    expected: *organization_id,
                    found: entry.organization_id,
                }
                .into());
            }
            set.insert(*entry);
            by_role
                .entry(entry.role_id)
                .or_default()
                .insert(entry.permission_id);
        }

        let generation = inner
            .closures
            .get(organization_id)
            .map_or(0, |c| c.state.generation)
            + 1;
        let state = ClosureState {
            organization_id: *organization_id,
            generation,
            source_revision,
            entry_count: set.len(),
            digest,
            rebuilt_at: now_millis(),
        };

        inner.closures.insert(
            *organization_id,
            StoredClosure {
                entries: set,
                by_role,
                state: state.clone(),
            },
        );

        Ok(state)
    }

    async fn closure_grants(&self, role_id: &RoleId, key: &str) -> Result<bool> {
        let inner = self.read()?;
        let Some(role) = inner.roles.get(role_id) else {
            return Ok(false);
        };
        let Some(permission_id) = inner.permission_id_for_key(role.organization_id, key) else {
            return Ok(false);
        };
        Ok(inner
            .closures
            .get(&role.organization_id)
            .and_then(|c| c.by_role.get(role_id))
            .is_some_and(|set| set.contains(&permission_id)))
    }

    async fn closure_entries(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ClosureEntry>> {
        Ok(self
            .read()?
            .closures
            .get(organization_id)
            .map(|c| c.entries.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn closure_state(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<ClosureState>> {
        Ok(self
            .read()?
            .closures
            .get(organization_id)
            .map(|c| c.state.clone()))
    }
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryStore, Organization) {
        let store = MemoryStore::new();
        let org = Organization::new("ACME Inc.");
        store.insert_organization(&org).await.unwrap();
        (store, org)
    }

    #[tokio::test]
    async fn test_permission_key_unique_per_organization() {
        let (store, org) = seeded().await;
        let other = Organization::new("Globex");
        store.insert_organization(&other).await.unwrap();

        store
            .insert_permission(&Permission::new(org.id, "project:post"))
            .await
            .unwrap();
        let err = store
            .insert_permission(&Permission::new(org.id, "project:post"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Same key in another organization is fine.
        store
            .insert_permission(&Permission::new(other.id, "project:post"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cross_organization_grant_rejected() {
        let (store, org) = seeded().await;
        let other = Organization::new("Globex");
        store.insert_organization(&other).await.unwrap();

        let role = Role::new(org.id, "Member");
        store.insert_role(&role).await.unwrap();
        let foreign = Permission::new(other.id, "billing:view");
        store.insert_permission(&foreign).await.unwrap();

        let err = store
            .grant_role_permission(&role.id, &foreign.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Integrity(IntegrityError::CrossOrganization { .. })
        ));
    }

    #[tokio::test]
    async fn test_revision_tracks_role_structure() {
        let (store, org) = seeded().await;
        assert_eq!(store.structure_revision(&org.id).await.unwrap(), 0);

        let role = Role::new(org.id, "Member");
        store.insert_role(&role).await.unwrap();
        let perm = Permission::new(org.id, "project:post");
        store.insert_permission(&perm).await.unwrap();
        let before = store.structure_revision(&org.id).await.unwrap();

        assert_eq!(
            store.grant_role_permission(&role.id, &perm.id).await.unwrap(),
            InsertResult::Inserted
        );
        let after_grant = store.structure_revision(&org.id).await.unwrap();
        assert!(after_grant > before);

        // Idempotent grant does not move the revision.
        assert_eq!(
            store.grant_role_permission(&role.id, &perm.id).await.unwrap(),
            InsertResult::AlreadyExists
        );
        assert_eq!(store.structure_revision(&org.id).await.unwrap(), after_grant);

        // Group grants never affect role closures.
        let group = Group::new(org.id, "Eng");
        store.insert_group(&group).await.unwrap();
        store.grant_group_permission(&group.id, &perm.id).await.unwrap();
        assert_eq!(store.structure_revision(&org.id).await.unwrap(), after_grant);
    }

    #[tokio::test]
    async fn test_replace_closure_swaps_whole_set() {
        let (store, org) = seeded().await;
        let role = Role::new(org.id, "Member");
        store.insert_role(&role).await.unwrap();
        let post = Permission::new(org.id, "project:post");
        let view = Permission::new(org.id, "billing:view");
        store.insert_permission(&post).await.unwrap();
        store.insert_permission(&view).await.unwrap();

        let first = vec![ClosureEntry {
            role_id: role.id,
            permission_id: post.id,
            organization_id: org.id,
        }];
        let state = store
            .replace_closure(&org.id, &first, 3, ClosureDigest::compute(&first))
            .await
            .unwrap();
        assert_eq!(state.generation, 1);
        assert!(store.closure_grants(&role.id, "project:post").await.unwrap());

        let second = vec![ClosureEntry {
            role_id: role.id,
            permission_id: view.id,
            organization_id: org.id,
        }];
        let state = store
            .replace_closure(&org.id, &second, 3, ClosureDigest::compute(&second))
            .await
            .unwrap();
        assert_eq!(state.generation, 2);
        assert_eq!(state.entry_count, 1);
        assert!(!store.closure_grants(&role.id, "project:post").await.unwrap());
        assert!(store.closure_grants(&role.id, "billing:view").await.unwrap());
        assert_eq!(store.closure_entries(&org.id).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_snapshot_of_unknown_organization() {
        let store = MemoryStore::new();
        let snapshot = store
            .role_graph_snapshot(&OrganizationId::new())
            .await
            .unwrap();
        assert!(snapshot.is_none());
    }
}
