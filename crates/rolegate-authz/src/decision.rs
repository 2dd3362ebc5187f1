//! Decision values and the evaluator trait.

use async_trait::async_trait;
use rolegate_core::{GroupId, RoleId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How far the role path looks for a permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Only the user's own role.
    Direct,
    /// The user's role and every ancestor.
    #[default]
    Inherited,
}

/// Which grant path produced an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantPath {
    /// The user is the organization admin.
    OrganizationAdmin,
    /// The user's group holds the permission directly.
    Group { group_id: GroupId },
    /// The user's role holds the permission.
    ///
    /// `via` names the ancestor that held it when a live walk found it
    /// above the user's role; it is `None` for a direct hit and for
    /// materialized lookups.
    Role { role_id: RoleId, via: Option<RoleId> },
}

/// Outcome of an entitlement check. There is no explicit deny rule;
/// `Denied` means no path granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted(GrantPath),
    Denied,
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted(_))
    }

    pub fn grant_path(&self) -> Option<&GrantPath> {
        match self {
            Decision::Granted(path) => Some(path),
            Decision::Denied => None,
        }
    }
}

/// Anything that can answer "is this user entitled to this key".
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Decide, recording which path granted.
    async fn decide(&self, user_id: &UserId, key: &str) -> Result<Decision>;

    /// Boolean form of [`Authorizer::decide`].
    async fn can(&self, user_id: &UserId, key: &str) -> Result<bool> {
        Ok(self.decide(user_id, key).await?.is_granted())
    }
}
