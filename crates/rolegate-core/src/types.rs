//! Strong identifier types for rolegate.
//!
//! All identifiers are UUID newtypes so a `RoleId` can never be passed
//! where a `PermissionId` is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InvalidIdentifier;

/// Which identifier failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Organization,
    User,
    Group,
    Role,
    Permission,
}

impl IdKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            IdKind::Organization => "organization",
            IdKind::User => "user",
            IdKind::Group => "group",
            IdKind::Role => "role",
            IdKind::Permission => "permission",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub const fn kind() -> IdKind {
                $kind
            }

            /// Parse from the textual UUID form.
            pub fn parse(s: &str) -> Result<Self, InvalidIdentifier> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(InvalidIdentifier::Empty { kind: $kind });
                }
                Uuid::parse_str(trimmed)
                    .map(Self)
                    .map_err(|_| InvalidIdentifier::Malformed {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $name {
            type Err = InvalidIdentifier;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let text = self.0.simple().to_string();
                write!(f, "{}({})", stringify!($name), &text[..8])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Identifier of an organization, the tenancy boundary for every other entity.
    OrganizationId,
    IdKind::Organization
);
define_id!(
    /// Identifier of a user.
    UserId,
    IdKind::User
);
define_id!(
    /// Identifier of a group.
    GroupId,
    IdKind::Group
);
define_id!(
    /// Identifier of a role.
    RoleId,
    IdKind::Role
);
define_id!(
    /// Identifier of a permission row. Matching uses the permission key, not this id.
    PermissionId,
    IdKind::Permission
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_text_roundtrip() {
        let id = RoleId::new();
        let text = id.to_string();
        let recovered: RoleId = text.parse().unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_parse_rejects_empty() {
        let err = UserId::parse("   ").unwrap_err();
        assert_eq!(err, InvalidIdentifier::Empty { kind: IdKind::User });
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = OrganizationId::parse("acme").unwrap_err();
        assert!(matches!(
            err,
            InvalidIdentifier::Malformed { kind: IdKind::Organization, .. }
        ));
    }

    #[test]
    fn test_debug_is_short() {
        let id = GroupId::from_uuid(Uuid::from_u128(0xabcdef01_0000_0000_0000_000000000000));
        assert_eq!(format!("{:?}", id), "GroupId(abcdef01)");
    }

    #[test]
    fn test_serde_transparent() {
        let id = PermissionId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
