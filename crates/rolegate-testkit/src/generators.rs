//! Proptest generators for property-based testing.
//!
//! Role hierarchies are generated as index-based forests: role `i` may
//! only point at a parent with a smaller index, so every generated
//! hierarchy is acyclic.

use std::sync::Arc;

use proptest::prelude::*;

use rolegate_core::{Role, User};
use rolegate_store::{Result, Store};

use crate::fixtures::OrgFixture;

/// Permission key for index `i`.
pub fn key(i: usize) -> String {
    format!("perm:{i}")
}

/// Generate a permission key, including shapes no fixture ever inserts.
pub fn any_key() -> impl Strategy<Value = String> {
    prop_oneof![
        (0usize..16).prop_map(key),
        "[a-z]{1,8}:[a-z]{1,8}".prop_map(String::from),
        Just(String::new()),
    ]
}

/// Shape of one organization's role forest.
#[derive(Debug, Clone)]
pub struct ForestParams {
    /// `parents[i]` is the index of role i's parent, always `< i`.
    pub parents: Vec<Option<usize>>,
    /// `grants[i]` are key indices granted directly to role i.
    pub grants: Vec<Vec<usize>>,
    /// Keys `0..key_count` exist as permissions.
    pub key_count: usize,
}

impl ForestParams {
    pub fn role_count(&self) -> usize {
        self.parents.len()
    }

    /// Reference answer: does role `i` reach key index `k` through its ancestors?
    pub fn reaches(&self, role: usize, k: usize) -> bool {
        let mut current = Some(role);
        while let Some(i) = current {
            if self.grants[i].contains(&k) {
                return true;
            }
            current = self.parents[i];
        }
        false
    }
}

/// Generate a forest of up to `max_roles` roles over up to `max_keys` keys.
pub fn role_forest(max_roles: usize, max_keys: usize) -> impl Strategy<Value = ForestParams> {
    (1..=max_roles.max(1), 1..=max_keys.max(1)).prop_flat_map(|(roles, keys)| {
        let parents = (0..roles)
            .map(|i| {
                if i == 0 {
                    Just(None).boxed()
                } else {
                    prop::option::weighted(0.7, 0..i).boxed()
                }
            })
            .collect::<Vec<_>>();
        let grants = prop::collection::vec(prop::collection::vec(0..keys, 0..=keys), roles);
        (parents, grants).prop_map(move |(parents, grants)| ForestParams {
            parents,
            grants,
            key_count: keys,
        })
    })
}

impl Arbitrary for ForestParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        role_forest(12, 6).boxed()
    }
}

/// A generated forest written into a store.
#[derive(Debug, Clone)]
pub struct PopulatedForest {
    /// Role `i` of the params.
    pub roles: Vec<Role>,
    /// One user per role, holding that role.
    pub users: Vec<User>,
}

/// Insert the forest into the fixture's organization.
///
/// Parents precede children in index order, so each role can be inserted
/// with its parent already present.
pub async fn populate_forest<S: Store + ?Sized>(
    org: &OrgFixture<S>,
    params: &ForestParams,
) -> Result<PopulatedForest> {
    for k in 0..params.key_count {
        org.permission(&key(k)).await?;
    }

    let mut roles: Vec<Role> = Vec::with_capacity(params.role_count());
    for (i, parent) in params.parents.iter().enumerate() {
        let parent = parent.map(|p| &roles[p]);
        let role = org.role(&format!("role-{i}"), parent).await?;
        roles.push(role);
    }

    for (i, keys) in params.grants.iter().enumerate() {
        for k in keys {
            org.grant_role(&roles[i], &key(*k)).await?;
        }
    }

    let mut users = Vec::with_capacity(roles.len());
    for (i, role) in roles.iter().enumerate() {
        users.push(org.user(&format!("user-{i}"), Some(role), None).await?);
    }

    Ok(PopulatedForest { roles, users })
}

/// Create an organization and populate it from `params` in one step.
pub async fn forest_organization<S: Store + ?Sized>(
    store: Arc<S>,
    params: &ForestParams,
) -> Result<(OrgFixture<S>, PopulatedForest)> {
    let org = OrgFixture::create(store, "forest").await?;
    let forest = populate_forest(&org, params).await?;
    Ok((org, forest))
}
