//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an organization bound to a
//! store, with helpers that insert roles, groups, permissions and users,
//! and the canonical admin, group and inheritance scenarios.

use std::sync::Arc;

use rolegate_core::{Group, Organization, Permission, Role, User};
use rolegate_store::{Result, Store};

/// An organization inserted into a store, plus helpers to populate it.
pub struct OrgFixture<S: Store + ?Sized> {
    pub store: Arc<S>,
    pub organization: Organization,
}

impl<S: Store + ?Sized> OrgFixture<S> {
    /// Insert a fresh organization.
    pub async fn create(store: Arc<S>, name: &str) -> Result<Self> {
        let organization = Organization::new(name);
        store.insert_organization(&organization).await?;
        Ok(Self {
            store,
            organization,
        })
    }

    pub fn id(&self) -> rolegate_core::OrganizationId {
        self.organization.id
    }

    pub async fn role(&self, name: &str, parent: Option<&Role>) -> Result<Role> {
        let mut role = Role::new(self.organization.id, name);
        if let Some(parent) = parent {
            role = role.with_parent(parent.id);
        }
        self.store.insert_role(&role).await?;
        Ok(role)
    }

    /// Get the permission with `key`, inserting it on first use.
    pub async fn permission(&self, key: &str) -> Result<Permission> {
        if let Some(existing) = self.store.permission_by_key(&self.organization.id, key).await? {
            return Ok(existing);
        }
        let permission = Permission::new(self.organization.id, key);
        self.store.insert_permission(&permission).await?;
        Ok(permission)
    }

    pub async fn grant_role(&self, role: &Role, key: &str) -> Result<Permission> {
        let permission = self.permission(key).await?;
        self.store
            .grant_role_permission(&role.id, &permission.id)
            .await?;
        Ok(permission)
    }

    pub async fn group(&self, name: &str) -> Result<Group> {
        let group = Group::new(self.organization.id, name);
        self.store.insert_group(&group).await?;
        Ok(group)
    }

    pub async fn grant_group(&self, group: &Group, key: &str) -> Result<Permission> {
        let permission = self.permission(key).await?;
        self.store
            .grant_group_permission(&group.id, &permission.id)
            .await?;
        Ok(permission)
    }

    pub async fn user(
        &self,
        name: &str,
        role: Option<&Role>,
        group: Option<&Group>,
    ) -> Result<User> {
        let mut user = User::new(self.organization.id, name);
        if let Some(role) = role {
            user = user.with_role(role.id);
        }
        if let Some(group) = group {
            user = user.with_group(group.id);
        }
        self.store.insert_user(&user).await?;
        Ok(user)
    }

    pub async fn make_admin(&self, user: &User) -> Result<()> {
        self.store
            .set_organization_admin(&self.organization.id, Some(user.id))
            .await
    }
}

/// A populated organization and the user a scenario is about.
pub struct Scenario<S: Store + ?Sized> {
    pub org: OrgFixture<S>,
    pub user: User,
    pub roles: Vec<Role>,
}

/// "ACME" with an "Org Admin" role held by Alice, who is also the
/// organization admin.
pub async fn admin_scenario<S: Store + ?Sized>(store: Arc<S>) -> Result<Scenario<S>> {
    let org = OrgFixture::create(store, "ACME").await?;
    let org_admin = org.role("Org Admin", None).await?;
    let alice = org.user("Alice", Some(&org_admin), None).await?;
    org.make_admin(&alice).await?;

    Ok(Scenario {
        org,
        user: alice,
        roles: vec![org_admin],
    })
}

/// Bob belongs to group "Eng", which holds "project:post".
pub async fn group_scenario<S: Store + ?Sized>(store: Arc<S>) -> Result<Scenario<S>> {
    let org = OrgFixture::create(store, "ACME").await?;
    let eng = org.group("Eng").await?;
    org.grant_group(&eng, "project:post").await?;
    // Exists in the organization but is not granted to Eng.
    org.permission("billing:view").await?;
    let bob = org.user("Bob", None, Some(&eng)).await?;

    Ok(Scenario {
        org,
        user: bob,
        roles: Vec::new(),
    })
}

/// "Member" holds "project:post"; "Group Admin" is its child and is
/// Carol's role.
pub async fn inheritance_scenario<S: Store + ?Sized>(store: Arc<S>) -> Result<Scenario<S>> {
    let org = OrgFixture::create(store, "ACME").await?;
    let member = org.role("Member", None).await?;
    org.grant_role(&member, "project:post").await?;
    let group_admin = org.role("Group Admin", Some(&member)).await?;
    let carol = org.user("Carol", Some(&group_admin), None).await?;

    Ok(Scenario {
        org,
        user: carol,
        roles: vec![member, group_admin],
    })
}
