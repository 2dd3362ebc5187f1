//! Role closure rebuilds.
//!
//! A rebuild reads an organization's role graph at one structure revision,
//! computes the full closure in memory and hands it to the store, which
//! swaps it in atomically. Nothing is written until the computation has
//! succeeded, so a corrupt hierarchy leaves the previous closure in place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rolegate_core::{ClosureDigest, OrganizationId};
use rolegate_store::Store;
use tokio::sync::Mutex;

use crate::error::{AuthzError, Result};

/// Summary of a completed rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub organization_id: OrganizationId,
    /// Closure generation after this rebuild.
    pub generation: u64,
    pub entry_count: usize,
    pub digest: ClosureDigest,
    /// Structure revision the closure reflects.
    pub source_revision: u64,
}

/// Rebuilds materialized closures, one organization at a time.
///
/// Rebuilds of the same organization queue behind a per-organization lock;
/// different organizations proceed in parallel. A lock lives in the map only
/// while some rebuild of its organization holds or awaits it.
pub struct ClosureBuilder<S: ?Sized> {
    store: Arc<S>,
    locks: Mutex<HashMap<OrganizationId, Arc<Mutex<()>>>>,
}

impl<S: Store + ?Sized> ClosureBuilder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn organization_lock(&self, organization_id: OrganizationId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(organization_id).or_default())
    }

    async fn release_lock(&self, organization_id: &OrganizationId) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(organization_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(organization_id);
        }
    }

    /// Discard and recompute the organization's closure.
    ///
    /// Total for any existing organization, including one without roles.
    pub async fn rebuild(&self, organization_id: &OrganizationId) -> Result<RebuildReport> {
        let lock = self.organization_lock(*organization_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.rebuild_locked(organization_id).await
        };
        drop(lock);
        self.release_lock(organization_id).await;
        outcome
    }

    async fn rebuild_locked(&self, organization_id: &OrganizationId) -> Result<RebuildReport> {
        let started = Instant::now();

        let snapshot = self
            .store
            .role_graph_snapshot(organization_id)
            .await?
            .ok_or(AuthzError::UnknownOrganization(*organization_id))?;

        let entries = snapshot
            .graph()
            .and_then(|graph| graph.compute_closure())
            .map_err(|e| {
                tracing::warn!(
                    organization = %organization_id,
                    revision = snapshot.revision,
                    error = %e,
                    "closure rebuild rejected"
                );
                AuthzError::DataIntegrity(e)
            })?;

        let digest = ClosureDigest::compute(&entries);
        let state = self
            .store
            .replace_closure(organization_id, &entries, snapshot.revision, digest)
            .await?;

        tracing::info!(
            organization = %organization_id,
            generation = state.generation,
            entries = state.entry_count,
            revision = state.source_revision,
            digest = %state.digest,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "closure rebuilt"
        );

        Ok(RebuildReport {
            organization_id: *organization_id,
            generation: state.generation,
            entry_count: state.entry_count,
            digest: state.digest,
            source_revision: state.source_revision,
        })
    }
}
