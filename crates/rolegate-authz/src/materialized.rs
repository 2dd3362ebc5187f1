//! Materialized evaluation against the precomputed closure table.

use std::sync::Arc;

use async_trait::async_trait;
use rolegate_core::{OrganizationId, UserId};
use rolegate_store::Store;

use crate::decision::{Authorizer, Decision, GrantPath};
use crate::error::Result;
use crate::subject::{self, Resolution};

/// How the stored closure relates to the current directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Built from the current structure revision.
    Fresh,
    /// Built from an older revision; answers may disagree with live
    /// evaluation until the next rebuild.
    Stale {
        closure_revision: u64,
        structure_revision: u64,
    },
    /// No closure has ever been built for the organization.
    NeverBuilt,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Evaluator whose role step is one membership test in the closure.
///
/// Correct up to the freshness of the last rebuild; see
/// [`MaterializedEvaluator::freshness`].
pub struct MaterializedEvaluator<S: ?Sized> {
    store: Arc<S>,
}

impl<S: Store + ?Sized> MaterializedEvaluator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Compare the closure's source revision with the live revision.
    pub async fn freshness(&self, organization_id: &OrganizationId) -> Result<Freshness> {
        let Some(state) = self.store.closure_state(organization_id).await? else {
            return Ok(Freshness::NeverBuilt);
        };
        let structure_revision = self.store.structure_revision(organization_id).await?;

        if state.source_revision == structure_revision {
            Ok(Freshness::Fresh)
        } else {
            Ok(Freshness::Stale {
                closure_revision: state.source_revision,
                structure_revision,
            })
        }
    }
}

#[async_trait]
impl<S: Store + ?Sized> Authorizer for MaterializedEvaluator<S> {
    async fn decide(&self, user_id: &UserId, key: &str) -> Result<Decision> {
        let (organization_id, role_id) =
            match subject::resolve(self.store.as_ref(), user_id, key).await? {
                Resolution::Settled(decision) => return Ok(decision),
                Resolution::Role {
                    organization_id,
                    role_id,
                } => (organization_id, role_id),
            };

        match self.store.role(&role_id).await? {
            Some(role) if role.organization_id == organization_id => {}
            _ => return Ok(Decision::Denied),
        }

        if self.store.closure_grants(&role_id, key).await? {
            tracing::debug!(role = %role_id, key, "granted by closure");
            return Ok(Decision::Granted(GrantPath::Role { role_id, via: None }));
        }
        Ok(Decision::Denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_core::{
        ClosureDigest, ClosureEntry, Organization, Permission, Role, User,
    };
    use rolegate_store::MemoryStore;

    #[tokio::test]
    async fn test_freshness_transitions() {
        let store = Arc::new(MemoryStore::new());
        let org = Organization::new("ACME");
        store.insert_organization(&org).await.unwrap();
        let role = Role::new(org.id, "Member");
        store.insert_role(&role).await.unwrap();

        let evaluator = MaterializedEvaluator::new(store.clone());
        assert_eq!(
            evaluator.freshness(&org.id).await.unwrap(),
            Freshness::NeverBuilt
        );

        let revision = store.structure_revision(&org.id).await.unwrap();
        store
            .replace_closure(&org.id, &[], revision, ClosureDigest::compute(&[]))
            .await
            .unwrap();
        assert!(evaluator.freshness(&org.id).await.unwrap().is_fresh());

        store
            .insert_permission(&Permission::new(org.id, "project:post"))
            .await
            .unwrap();
        assert_eq!(
            evaluator.freshness(&org.id).await.unwrap(),
            Freshness::Stale {
                closure_revision: revision,
                structure_revision: revision + 1,
            }
        );
    }

    #[tokio::test]
    async fn test_reads_only_the_closure() {
        let store = Arc::new(MemoryStore::new());
        let org = Organization::new("ACME");
        store.insert_organization(&org).await.unwrap();
        let role = Role::new(org.id, "Member");
        store.insert_role(&role).await.unwrap();
        let post = Permission::new(org.id, "project:post");
        store.insert_permission(&post).await.unwrap();
        store.grant_role_permission(&role.id, &post.id).await.unwrap();
        let dave = User::new(org.id, "Dave").with_role(role.id);
        store.insert_user(&dave).await.unwrap();

        let evaluator = MaterializedEvaluator::new(store.clone());
        // Direct grant exists but nothing has been materialized yet.
        assert!(!evaluator.can(&dave.id, "project:post").await.unwrap());

        let entries = vec![ClosureEntry {
            role_id: role.id,
            permission_id: post.id,
            organization_id: org.id,
        }];
        let revision = store.structure_revision(&org.id).await.unwrap();
        store
            .replace_closure(&org.id, &entries, revision, ClosureDigest::compute(&entries))
            .await
            .unwrap();

        assert_eq!(
            evaluator.decide(&dave.id, "project:post").await.unwrap(),
            Decision::Granted(GrantPath::Role {
                role_id: role.id,
                via: None,
            })
        );
        assert!(!evaluator.can(&dave.id, "billing:view").await.unwrap());
    }
}
