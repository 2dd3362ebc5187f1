//! Live evaluation: the role hierarchy is walked at query time.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rolegate_core::{OrganizationId, RoleId, UserId};
use rolegate_store::Store;

use crate::decision::{Authorizer, Decision, EvaluationMode, GrantPath};
use crate::error::Result;
use crate::subject::{self, Resolution};

/// Evaluator that reads grants straight from the directory.
///
/// Always current, at the cost of one lookup per ancestor in
/// [`EvaluationMode::Inherited`].
pub struct LiveEvaluator<S: ?Sized> {
    store: Arc<S>,
    mode: EvaluationMode,
}

impl<S: Store + ?Sized> LiveEvaluator<S> {
    pub fn new(store: Arc<S>, mode: EvaluationMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    /// Decide with an explicit mode instead of the configured one.
    pub async fn decide_with_mode(
        &self,
        user_id: &UserId,
        key: &str,
        mode: EvaluationMode,
    ) -> Result<Decision> {
        match subject::resolve(self.store.as_ref(), user_id, key).await? {
            Resolution::Settled(decision) => Ok(decision),
            Resolution::Role {
                organization_id,
                role_id,
            } => match mode {
                EvaluationMode::Direct => self.direct(organization_id, role_id, key).await,
                EvaluationMode::Inherited => self.inherited(organization_id, role_id, key).await,
            },
        }
    }

    async fn direct(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        key: &str,
    ) -> Result<Decision> {
        let Some(role) = self.store.role(&role_id).await? else {
            return Ok(Decision::Denied);
        };
        if role.organization_id != organization_id {
            return Ok(Decision::Denied);
        }

        if self.store.role_has_permission_key(&role_id, key).await? {
            tracing::debug!(role = %role_id, key, "granted by role");
            return Ok(Decision::Granted(GrantPath::Role { role_id, via: None }));
        }
        Ok(Decision::Denied)
    }

    /// Walk from the user's role up through its parents.
    ///
    /// A repeated role or a dangling parent ends the walk; whatever was
    /// collected so far still counts. Rebuilds are where such corruption
    /// is reported.
    async fn inherited(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        key: &str,
    ) -> Result<Decision> {
        let mut visited = HashSet::new();
        let mut current = Some(role_id);

        while let Some(id) = current {
            if !visited.insert(id) {
                tracing::warn!(role = %role_id, repeated = %id, "role hierarchy cycle, walk stopped");
                break;
            }

            let Some(role) = self.store.role(&id).await? else {
                if id != role_id {
                    tracing::warn!(role = %role_id, missing = %id, "dangling parent, walk stopped");
                }
                break;
            };
            if role.organization_id != organization_id {
                break;
            }

            if self.store.role_has_permission_key(&id, key).await? {
                let via = (id != role_id).then_some(id);
                tracing::debug!(role = %role_id, holder = %id, key, "granted by role");
                return Ok(Decision::Granted(GrantPath::Role { role_id, via }));
            }

            current = role.parent_role_id;
        }

        Ok(Decision::Denied)
    }
}

#[async_trait]
impl<S: Store + ?Sized> Authorizer for LiveEvaluator<S> {
    async fn decide(&self, user_id: &UserId, key: &str) -> Result<Decision> {
        self.decide_with_mode(user_id, key, self.mode).await
    }
}
