//! Directory entities: organizations, users, groups, roles, permissions.
//!
//! Every entity except [`Organization`] carries the id of the organization
//! it belongs to. References between entities must stay inside that
//! organization; see [`crate::validation`].

use serde::{Deserialize, Serialize};

use crate::types::{GroupId, OrganizationId, PermissionId, RoleId, UserId};

/// A tenant. Its optional admin is granted every permission unconditionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub admin_id: Option<UserId>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OrganizationId::new(),
            name: name.into(),
            admin_id: None,
        }
    }

    /// Whether `user` is this organization's admin.
    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admin_id.as_ref() == Some(user)
    }
}

/// A user. Belongs to exactly one organization, at most one group and one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub group_id: Option<GroupId>,
    pub role_id: Option<RoleId>,
}

impl User {
    pub fn new(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            organization_id,
            name: name.into(),
            group_id: None,
            role_id: None,
        }
    }

    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_role(mut self, role_id: RoleId) -> Self {
        self.role_id = Some(role_id);
        self
    }
}

/// A group of users sharing directly-assigned permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub organization_id: OrganizationId,
    pub name: String,
}

impl Group {
    pub fn new(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(),
            organization_id,
            name: name.into(),
        }
    }
}

/// A role. The optional parent forms the role hierarchy; a role inherits
/// every permission of its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub parent_role_id: Option<RoleId>,
}

impl Role {
    pub fn new(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(),
            organization_id,
            name: name.into(),
            parent_role_id: None,
        }
    }

    pub fn with_parent(mut self, parent: RoleId) -> Self {
        self.parent_role_id = Some(parent);
        self
    }
}

/// A permission. `key` is unique within its organization and is the only
/// matching criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub organization_id: OrganizationId,
    pub key: String,
}

impl Permission {
    pub fn new(organization_id: OrganizationId, key: impl Into<String>) -> Self {
        Self {
            id: PermissionId::new(),
            organization_id,
            key: key.into(),
        }
    }
}

/// One row of the materialized closure: `role_id` is entitled to
/// `permission_id`, directly or through an ancestor.
///
/// Derived data. Ordering is (role, permission) so a sorted entry set is
/// deterministic for a given directory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClosureEntry {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub organization_id: OrganizationId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_admin_check() {
        let mut org = Organization::new("ACME");
        let alice = UserId::new();
        assert!(!org.is_admin(&alice));

        org.admin_id = Some(alice);
        assert!(org.is_admin(&alice));
        assert!(!org.is_admin(&UserId::new()));
    }

    #[test]
    fn test_builders_attach_references() {
        let org = Organization::new("ACME");
        let member = Role::new(org.id, "Member");
        let group_admin = Role::new(org.id, "Group Admin").with_parent(member.id);
        assert_eq!(group_admin.parent_role_id, Some(member.id));

        let group = Group::new(org.id, "Eng");
        let carol = User::new(org.id, "Carol")
            .with_role(group_admin.id)
            .with_group(group.id);
        assert_eq!(carol.role_id, Some(group_admin.id));
        assert_eq!(carol.group_id, Some(group.id));
        assert_eq!(carol.organization_id, org.id);
    }
}
