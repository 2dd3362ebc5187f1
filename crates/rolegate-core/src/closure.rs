//! Role hierarchy closure.
//!
//! A [`RoleGraph`] is the adjacency view of one organization's roles: each
//! role points at its optional parent and holds its directly-assigned
//! permissions. The closure of a role is the union of its own permissions
//! and those of every ancestor. Closures are computed by explicit iterative
//! walks over parent pointers with an on-path set, so a cyclic hierarchy is
//! reported instead of looping.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::{ClosureEntry, Role};
use crate::error::IntegrityError;
use crate::types::{OrganizationId, PermissionId, RoleId};
use crate::validation::ensure_same_organization;

/// Parent pointers and direct grants for one organization.
#[derive(Debug, Clone)]
pub struct RoleGraph {
    organization_id: OrganizationId,
    parents: HashMap<RoleId, Option<RoleId>>,
    direct: HashMap<RoleId, BTreeSet<PermissionId>>,
}

impl RoleGraph {
    /// Build the graph from an organization's roles and `(role, permission)` grants.
    ///
    /// Fails if a role belongs to another organization, a parent is not one
    /// of `roles`, or a grant names a role that is not one of `roles`.
    pub fn new(
        organization_id: OrganizationId,
        roles: &[Role],
        grants: &[(RoleId, PermissionId)],
    ) -> Result<Self, IntegrityError> {
        let mut parents = HashMap::with_capacity(roles.len());
        for role in roles {
            ensure_same_organization(organization_id, role)?;
            parents.insert(role.id, role.parent_role_id);
        }

        for role in roles {
            if let Some(parent) = role.parent_role_id {
                if !parents.contains_key(&parent) {
                    return Err(IntegrityError::UnknownParent {
                        role: role.id,
                        parent,
                    });
                }
            }
        }

        let mut direct: HashMap<RoleId, BTreeSet<PermissionId>> = HashMap::new();
        for (role_id, permission_id) in grants {
            if !parents.contains_key(role_id) {
                return Err(IntegrityError::UnknownRole(*role_id));
            }
            direct.entry(*role_id).or_default().insert(*permission_id);
        }

        Ok(Self {
            organization_id,
            parents,
            direct,
        })
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn role_count(&self) -> usize {
        self.parents.len()
    }

    pub fn contains(&self, role: &RoleId) -> bool {
        self.parents.contains_key(role)
    }

    /// Permissions assigned directly to `role` (no inheritance).
    pub fn direct_permissions(&self, role: &RoleId) -> impl Iterator<Item = &PermissionId> {
        self.direct.get(role).into_iter().flatten()
    }

    /// The ancestor chain of `role`, starting with `role` itself and ending
    /// at a root.
    pub fn ancestors(&self, role: RoleId) -> Result<Vec<RoleId>, IntegrityError> {
        if !self.contains(&role) {
            return Err(IntegrityError::UnknownRole(role));
        }

        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut current = Some(role);

        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(cycle_error(&chain, id));
            }
            chain.push(id);
            current = self.parents.get(&id).copied().flatten();
        }

        Ok(chain)
    }

    /// Closure of a single role: its own permissions plus every ancestor's.
    pub fn closure_of(&self, role: RoleId) -> Result<BTreeSet<PermissionId>, IntegrityError> {
        let mut permissions = BTreeSet::new();
        for id in self.ancestors(role)? {
            permissions.extend(self.direct_permissions(&id).copied());
        }
        Ok(permissions)
    }

    /// Compute the full closure table for the organization.
    ///
    /// Entries are deduplicated per `(role, permission)` and sorted. Each
    /// role is resolved once: a walk stops as soon as it reaches a role
    /// whose closure is already known, then unwinds toward the starting role.
    pub fn compute_closure(&self) -> Result<Vec<ClosureEntry>, IntegrityError> {
        let mut resolved: HashMap<RoleId, BTreeSet<PermissionId>> =
            HashMap::with_capacity(self.parents.len());

        let mut roles: Vec<RoleId> = self.parents.keys().copied().collect();
        roles.sort_unstable();

        for start in roles {
            if resolved.contains_key(&start) {
                continue;
            }

            let mut path: Vec<RoleId> = Vec::new();
            let mut on_path: HashSet<RoleId> = HashSet::new();
            let mut current = start;

            let mut inherited = loop {
                if let Some(known) = resolved.get(&current) {
                    break known.clone();
                }
                if !on_path.insert(current) {
                    return Err(cycle_error(&path, current));
                }
                path.push(current);
                match self.parents.get(&current).copied().flatten() {
                    Some(parent) => current = parent,
                    None => break BTreeSet::new(),
                }
            };

            // Root-most role first, so each step adds one level of grants.
            for id in path.into_iter().rev() {
                inherited.extend(self.direct_permissions(&id).copied());
                resolved.insert(id, inherited.clone());
            }
        }

        let organization_id = self.organization_id;
        let mut entries: Vec<ClosureEntry> = resolved
            .into_iter()
            .flat_map(|(role_id, permissions)| {
                permissions.into_iter().map(move |permission_id| ClosureEntry {
                    role_id,
                    permission_id,
                    organization_id,
                })
            })
            .collect();
        entries.sort_unstable();

        Ok(entries)
    }
}

fn cycle_error(chain: &[RoleId], repeated: RoleId) -> IntegrityError {
    let start = chain.iter().position(|id| *id == repeated).unwrap_or(0);
    let mut path = chain[start..].to_vec();
    path.push(repeated);
    IntegrityError::Cycle {
        role: repeated,
        path,
    }
}

/// A 32-byte Blake3 fingerprint of a closure entry set.
///
/// Independent of input order: two rebuilds over the same directory state
/// yield the same digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClosureDigest(pub [u8; 32]);

impl ClosureDigest {
    /// Digest of an entry set. Duplicates are counted once.
    pub fn compute(entries: &[ClosureEntry]) -> Self {
        let unique: BTreeSet<&ClosureEntry> = entries.iter().collect();

        let mut hasher = blake3::Hasher::new();
        hasher.update(&(unique.len() as u64).to_be_bytes());
        for entry in unique {
            hasher.update(entry.organization_id.as_uuid().as_bytes());
            hasher.update(entry.role_id.as_uuid().as_bytes());
            hasher.update(entry.permission_id.as_uuid().as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for ClosureDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClosureDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ClosureDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<&[u8]> for ClosureDigest {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}
