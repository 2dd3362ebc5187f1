//! Store outages surface as `StoreUnavailable`, never as a denial, and a
//! rebuild that cannot be written leaves the prior closure in place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rolegate::core::{
    ClosureDigest, ClosureEntry, Group, GroupId, Organization, OrganizationId, Permission,
    PermissionId, Role, RoleId, User, UserId,
};
use rolegate::store::{
    ClosureState, InsertResult, MemoryStore, RoleGraphSnapshot, Store, StoreError,
};
use rolegate::{EvaluationMode, Gate, GateConfig, GateError};
use rolegate_testkit::inheritance_scenario;

/// In-memory store that can be switched off, wholesale or for closure writes only.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
    replace_down: AtomicBool,
}

impl FlakyStore {
    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn set_replace_down(&self, down: bool) {
        self.replace_down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> rolegate::store::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn organization(&self, id: &OrganizationId) -> rolegate::store::Result<Option<Organization>> {
        self.check()?;
        self.inner.organization(id).await
    }

    async fn user(&self, id: &UserId) -> rolegate::store::Result<Option<User>> {
        self.check()?;
        self.inner.user(id).await
    }

    async fn group(&self, id: &GroupId) -> rolegate::store::Result<Option<Group>> {
        self.check()?;
        self.inner.group(id).await
    }

    async fn role(&self, id: &RoleId) -> rolegate::store::Result<Option<Role>> {
        self.check()?;
        self.inner.role(id).await
    }

    async fn permission_by_key(
        &self,
        organization_id: &OrganizationId,
        key: &str,
    ) -> rolegate::store::Result<Option<Permission>> {
        self.check()?;
        self.inner.permission_by_key(organization_id, key).await
    }

    async fn roles_in_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> rolegate::store::Result<Vec<Role>> {
        self.check()?;
        self.inner.roles_in_organization(organization_id).await
    }

    async fn group_has_permission_key(
        &self,
        group_id: &GroupId,
        key: &str,
    ) -> rolegate::store::Result<bool> {
        self.check()?;
        self.inner.group_has_permission_key(group_id, key).await
    }

    async fn role_has_permission_key(
        &self,
        role_id: &RoleId,
        key: &str,
    ) -> rolegate::store::Result<bool> {
        self.check()?;
        self.inner.role_has_permission_key(role_id, key).await
    }

    async fn insert_organization(&self, organization: &Organization) -> rolegate::store::Result<()> {
        self.check()?;
        self.inner.insert_organization(organization).await
    }

    async fn set_organization_admin(
        &self,
        organization_id: &OrganizationId,
        admin_id: Option<UserId>,
    ) -> rolegate::store::Result<()> {
        self.check()?;
        self.inner.set_organization_admin(organization_id, admin_id).await
    }

    async fn insert_user(&self, user: &User) -> rolegate::store::Result<()> {
        self.check()?;
        self.inner.insert_user(user).await
    }

    async fn insert_group(&self, group: &Group) -> rolegate::store::Result<()> {
        self.check()?;
        self.inner.insert_group(group).await
    }

    async fn insert_role(&self, role: &Role) -> rolegate::store::Result<()> {
        self.check()?;
        self.inner.insert_role(role).await
    }

    async fn set_role_parent(
        &self,
        role_id: &RoleId,
        parent: Option<RoleId>,
    ) -> rolegate::store::Result<()> {
        self.check()?;
        self.inner.set_role_parent(role_id, parent).await
    }

    async fn insert_permission(&self, permission: &Permission) -> rolegate::store::Result<()> {
        self.check()?;
        self.inner.insert_permission(permission).await
    }

    async fn grant_group_permission(
        &self,
        group_id: &GroupId,
        permission_id: &PermissionId,
    ) -> rolegate::store::Result<InsertResult> {
        self.check()?;
        self.inner.grant_group_permission(group_id, permission_id).await
    }

    async fn grant_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> rolegate::store::Result<InsertResult> {
        self.check()?;
        self.inner.grant_role_permission(role_id, permission_id).await
    }

    async fn revoke_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> rolegate::store::Result<bool> {
        self.check()?;
        self.inner.revoke_role_permission(role_id, permission_id).await
    }

    async fn structure_revision(
        &self,
        organization_id: &OrganizationId,
    ) -> rolegate::store::Result<u64> {
        self.check()?;
        self.inner.structure_revision(organization_id).await
    }

    async fn role_graph_snapshot(
        &self,
        organization_id: &OrganizationId,
    ) -> rolegate::store::Result<Option<RoleGraphSnapshot>> {
        self.check()?;
        self.inner.role_graph_snapshot(organization_id).await
    }

    async fn replace_closure(
        &self,
        organization_id: &OrganizationId,
        entries: &[ClosureEntry],
        source_revision: u64,
        digest: ClosureDigest,
    ) -> rolegate::store::Result<ClosureState> {
        self.check()?;
        if self.replace_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner
            .replace_closure(organization_id, entries, source_revision, digest)
            .await
    }

    async fn closure_grants(&self, role_id: &RoleId, key: &str) -> rolegate::store::Result<bool> {
        self.check()?;
        self.inner.closure_grants(role_id, key).await
    }

    async fn closure_entries(
        &self,
        organization_id: &OrganizationId,
    ) -> rolegate::store::Result<Vec<ClosureEntry>> {
        self.check()?;
        self.inner.closure_entries(organization_id).await
    }

    async fn closure_state(
        &self,
        organization_id: &OrganizationId,
    ) -> rolegate::store::Result<Option<ClosureState>> {
        self.check()?;
        self.inner.closure_state(organization_id).await
    }
}

#[tokio::test]
async fn outage_is_an_error_not_a_denial() -> Result<()> {
    let store = Arc::new(FlakyStore::default());
    let scenario = inheritance_scenario(store.clone()).await?;
    let carol = scenario.user.id.to_string();

    for config in [
        GateConfig::live(EvaluationMode::Inherited),
        GateConfig::materialized(),
        GateConfig::default(),
    ] {
        let gate = Gate::with_shared_store(store.clone(), config)?;
        gate.rebuild_organization(&scenario.org.id()).await?;
        assert!(gate.can(&carol, "project:post").await?);

        store.set_down(true);
        let outcome = gate.can(&carol, "project:post").await;
        assert!(
            matches!(outcome, Err(GateError::StoreUnavailable(StoreError::Unavailable(_)))),
            "{outcome:?}"
        );
        assert!(matches!(
            gate.rebuild(&scenario.org.id().to_string()).await,
            Err(GateError::StoreUnavailable(_))
        ));
        store.set_down(false);
    }
    Ok(())
}

#[tokio::test]
async fn failed_closure_write_keeps_prior_closure() -> Result<()> {
    let store = Arc::new(FlakyStore::default());
    let scenario = inheritance_scenario(store.clone()).await?;
    let org_id = scenario.org.id();
    let member = &scenario.roles[0];
    let carol = scenario.user.id;

    let gate = Gate::with_shared_store(store.clone(), GateConfig::materialized())?;
    let before = gate.rebuild_organization(&org_id).await?;
    let entries_before = store.closure_entries(&org_id).await?;

    let post = scenario.org.permission("project:post").await?;
    store.revoke_role_permission(&member.id, &post.id).await?;

    store.set_replace_down(true);
    assert!(matches!(
        gate.rebuild_organization(&org_id).await,
        Err(GateError::StoreUnavailable(_))
    ));

    let state = store.closure_state(&org_id).await?.expect("closure state");
    assert_eq!(state.generation, before.generation);
    assert_eq!(state.digest, before.digest);
    assert_eq!(store.closure_entries(&org_id).await?, entries_before);
    assert!(gate.can_user(&carol, "project:post").await?);

    // An inline rebuild that cannot be written is an error too.
    let eager = Gate::with_shared_store(
        store.clone(),
        GateConfig {
            rebuild_on_stale: true,
            ..GateConfig::materialized()
        },
    )?;
    assert!(matches!(
        eager.can_user(&carol, "project:post").await,
        Err(GateError::StoreUnavailable(_))
    ));

    store.set_replace_down(false);
    gate.rebuild_organization(&org_id).await?;
    assert!(!gate.can_user(&carol, "project:post").await?);
    Ok(())
}
