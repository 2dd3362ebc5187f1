//! The Gate: single entry point for entitlement checks.
//!
//! The Gate owns one store handle shared by a live evaluator, a
//! materialized evaluator and a closure builder, and dispatches each check
//! according to its [`GateConfig`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rolegate_authz::{
    Authorizer, AuthzError, ClosureBuilder, Decision, EvaluationMode, Freshness, LiveEvaluator,
    MaterializedEvaluator, RebuildReport,
};
use rolegate_core::{OrganizationId, UserId};
use rolegate_store::Store;

use crate::config::{GateConfig, Strategy};
use crate::error::Result;

/// Decision facade over a [`Store`].
pub struct Gate<S: Store + ?Sized> {
    store: Arc<S>,
    config: GateConfig,
    live: LiveEvaluator<S>,
    materialized: MaterializedEvaluator<S>,
    builder: ClosureBuilder<S>,
    /// Structure revision at which an inline rebuild last failed, per org.
    rejected: Mutex<HashMap<OrganizationId, u64>>,
}

impl<S: Store> Gate<S> {
    /// Create a gate that takes ownership of the store.
    pub fn new(store: S, config: GateConfig) -> Result<Self> {
        Self::with_shared_store(Arc::new(store), config)
    }
}

impl<S: Store + ?Sized> Gate<S> {
    /// Create a gate over a store that other components also hold.
    pub fn with_shared_store(store: Arc<S>, config: GateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            live: LiveEvaluator::new(Arc::clone(&store), config.live_mode),
            materialized: MaterializedEvaluator::new(Arc::clone(&store)),
            builder: ClosureBuilder::new(Arc::clone(&store)),
            rejected: Mutex::new(HashMap::new()),
            store,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entitlement Checks
    // ─────────────────────────────────────────────────────────────────────────

    /// Check an entitlement for a textual user id.
    ///
    /// Malformed ids are an `InvalidArgument` error; well-formed ids of
    /// users that do not exist are simply denied.
    pub async fn can(&self, user_id: &str, key: &str) -> Result<bool> {
        let user_id = UserId::parse(user_id)?;
        self.can_user(&user_id, key).await
    }

    pub async fn can_user(&self, user_id: &UserId, key: &str) -> Result<bool> {
        Ok(self.decide(user_id, key).await?.is_granted())
    }

    /// Decide and report which path granted.
    pub async fn decide(&self, user_id: &UserId, key: &str) -> Result<Decision> {
        if self.config.strategy == Strategy::Live {
            return Ok(self.live.decide(user_id, key).await?);
        }

        let Some(organization_id) = self.organization_of(user_id).await? else {
            return Ok(Decision::Denied);
        };

        let freshness = self.ensure_fresh(&organization_id).await?;
        if freshness.is_fresh() {
            return Ok(self.materialized.decide(user_id, key).await?);
        }

        match self.config.strategy {
            Strategy::MaterializedOrLive => {
                tracing::warn!(
                    organization = %organization_id,
                    freshness = ?freshness,
                    "closure not fresh, evaluating live"
                );
                Ok(self
                    .live
                    .decide_with_mode(user_id, key, EvaluationMode::Inherited)
                    .await?)
            }
            _ => {
                tracing::warn!(
                    organization = %organization_id,
                    freshness = ?freshness,
                    "closure not fresh, answering from it"
                );
                Ok(self.materialized.decide(user_id, key).await?)
            }
        }
    }

    async fn organization_of(&self, user_id: &UserId) -> Result<Option<OrganizationId>> {
        Ok(self
            .store
            .user(user_id)
            .await?
            .map(|user| user.organization_id))
    }

    /// Freshness of the closure, after a rebuild when `rebuild_on_stale` is set.
    ///
    /// A rebuild rejected for data integrity leaves the prior closure in
    /// place and is not retried until the structure revision moves.
    async fn ensure_fresh(&self, organization_id: &OrganizationId) -> Result<Freshness> {
        let freshness = self.materialized.freshness(organization_id).await?;
        if freshness.is_fresh() || !self.config.rebuild_on_stale {
            return Ok(freshness);
        }

        let revision = self.store.structure_revision(organization_id).await?;
        if self.rejected_revision(organization_id) == Some(revision) {
            return Ok(freshness);
        }

        match self.builder.rebuild(organization_id).await {
            Ok(_) => {
                self.rejected_lock().remove(organization_id);
                Ok(self.materialized.freshness(organization_id).await?)
            }
            Err(AuthzError::DataIntegrity(e)) => {
                tracing::warn!(
                    organization = %organization_id,
                    revision,
                    error = %e,
                    "rebuild on stale rejected, keeping prior closure"
                );
                self.rejected_lock().insert(*organization_id, revision);
                Ok(freshness)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn rejected_revision(&self, organization_id: &OrganizationId) -> Option<u64> {
        self.rejected_lock().get(organization_id).copied()
    }

    fn rejected_lock(&self) -> MutexGuard<'_, HashMap<OrganizationId, u64>> {
        self.rejected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Closure Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Rebuild the closure of an organization given by textual id.
    pub async fn rebuild(&self, organization_id: &str) -> Result<RebuildReport> {
        let organization_id = OrganizationId::parse(organization_id)?;
        self.rebuild_organization(&organization_id).await
    }

    pub async fn rebuild_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<RebuildReport> {
        Ok(self.builder.rebuild(organization_id).await?)
    }

    /// Freshness of an organization's closure.
    pub async fn freshness(&self, organization_id: &OrganizationId) -> Result<Freshness> {
        Ok(self.materialized.freshness(organization_id).await?)
    }
}

#[async_trait]
impl<S: Store + ?Sized> Authorizer for Gate<S> {
    async fn decide(&self, user_id: &UserId, key: &str) -> rolegate_authz::Result<Decision> {
        Gate::decide(self, user_id, key).await.map_err(|e| match e {
            crate::GateError::InvalidArgument(msg) | crate::GateError::InvalidConfig(msg) => {
                AuthzError::InvalidArgument(msg)
            }
            crate::GateError::DataIntegrity(e) => AuthzError::DataIntegrity(e),
            crate::GateError::StoreUnavailable(e) => AuthzError::StoreUnavailable(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GateError;
    use rolegate_core::{Organization, Permission, Role, User};
    use rolegate_store::MemoryStore;

    async fn carol_gate(config: GateConfig) -> (Gate<MemoryStore>, Organization, Role, User) {
        let gate = Gate::new(MemoryStore::new(), config).unwrap();
        let store = gate.store();

        let org = Organization::new("ACME");
        store.insert_organization(&org).await.unwrap();
        let member = Role::new(org.id, "Member");
        let lead = Role::new(org.id, "Group Admin").with_parent(member.id);
        store.insert_role(&member).await.unwrap();
        store.insert_role(&lead).await.unwrap();
        let post = Permission::new(org.id, "project:post");
        store.insert_permission(&post).await.unwrap();
        store.grant_role_permission(&member.id, &post.id).await.unwrap();

        let carol = User::new(org.id, "Carol").with_role(lead.id);
        store.insert_user(&carol).await.unwrap();
        (gate, org, lead, carol)
    }

    #[tokio::test]
    async fn test_malformed_ids_are_invalid_arguments() {
        let (gate, _, _, _) = carol_gate(GateConfig::default()).await;
        assert!(matches!(
            gate.can("not-a-uuid", "project:post").await,
            Err(GateError::InvalidArgument(_))
        ));
        assert!(matches!(
            gate.rebuild("").await,
            Err(GateError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_denied_not_error() {
        let (gate, _, _, _) = carol_gate(GateConfig::default()).await;
        let missing = UserId::new().to_string();
        assert!(!gate.can(&missing, "project:post").await.unwrap());
    }

    #[tokio::test]
    async fn test_materialized_or_live_falls_back_before_first_rebuild() {
        let (gate, org, _, carol) = carol_gate(GateConfig::default()).await;
        assert_eq!(gate.freshness(&org.id).await.unwrap(), Freshness::NeverBuilt);
        assert!(gate.can_user(&carol.id, "project:post").await.unwrap());
        // Fallback does not build anything.
        assert_eq!(gate.freshness(&org.id).await.unwrap(), Freshness::NeverBuilt);
    }

    #[tokio::test]
    async fn test_materialized_without_rebuild_denies() {
        let (gate, org, _, carol) = carol_gate(GateConfig::materialized()).await;
        assert!(!gate.can_user(&carol.id, "project:post").await.unwrap());

        gate.rebuild(&org.id.to_string()).await.unwrap();
        assert!(gate.can_user(&carol.id, "project:post").await.unwrap());
    }

    #[tokio::test]
    async fn test_rebuild_on_stale() {
        let config = GateConfig {
            rebuild_on_stale: true,
            ..GateConfig::materialized()
        };
        let (gate, org, _, carol) = carol_gate(config).await;

        assert!(gate.can_user(&carol.id, "project:post").await.unwrap());
        assert!(gate.freshness(&org.id).await.unwrap().is_fresh());
    }

    #[tokio::test]
    async fn test_unknown_organization_rebuild() {
        let (gate, _, _, _) = carol_gate(GateConfig::default()).await;
        let err = gate
            .rebuild_organization(&OrganizationId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_gate_is_an_authorizer() {
        let (gate, _, lead, carol) = carol_gate(GateConfig::live(EvaluationMode::Inherited)).await;
        let authorizer: &dyn Authorizer = &gate;
        let decision = authorizer.decide(&carol.id, "project:post").await.unwrap();
        assert!(matches!(
            decision,
            Decision::Granted(rolegate_authz::GrantPath::Role { role_id, via: Some(_) })
                if role_id == lead.id
        ));
        assert!(!authorizer.can(&carol.id, "billing:view").await.unwrap());
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = GateConfig {
            rebuild_on_stale: true,
            ..GateConfig::live(EvaluationMode::Inherited)
        };
        assert!(matches!(
            Gate::new(MemoryStore::new(), config),
            Err(GateError::InvalidConfig(_))
        ));
    }
}
