//! Subject resolution shared by both evaluators.
//!
//! Resolves the user and organization, then tries the admin override and
//! the group grant. Only the role path differs between live and
//! materialized evaluation, so that is left to the caller.

use rolegate_core::{OrganizationId, RoleId, User, UserId};
use rolegate_store::Store;

use crate::decision::{Decision, GrantPath};
use crate::error::Result;

/// What remains to be decided after the admin and group paths.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// The decision is final.
    Settled(Decision),
    /// Neither admin nor group granted; check this role.
    Role {
        organization_id: OrganizationId,
        role_id: RoleId,
    },
}

pub(crate) async fn resolve<S>(store: &S, user_id: &UserId, key: &str) -> Result<Resolution>
where
    S: Store + ?Sized,
{
    let Some(user) = store.user(user_id).await? else {
        tracing::debug!(user = %user_id, key, "unknown user, denied");
        return Ok(Resolution::Settled(Decision::Denied));
    };

    let Some(organization) = store.organization(&user.organization_id).await? else {
        tracing::debug!(user = %user_id, organization = %user.organization_id, "organization missing, denied");
        return Ok(Resolution::Settled(Decision::Denied));
    };

    if organization.is_admin(&user.id) {
        tracing::debug!(user = %user_id, key, "granted by organization admin");
        return Ok(Resolution::Settled(Decision::Granted(
            GrantPath::OrganizationAdmin,
        )));
    }

    if let Some(group_id) = user.group_id {
        if store.group_has_permission_key(&group_id, key).await? {
            tracing::debug!(user = %user_id, group = %group_id, key, "granted by group");
            return Ok(Resolution::Settled(Decision::Granted(GrantPath::Group {
                group_id,
            })));
        }
    }

    Ok(role_of(&user))
}

fn role_of(user: &User) -> Resolution {
    match user.role_id {
        Some(role_id) => Resolution::Role {
            organization_id: user.organization_id,
            role_id,
        },
        None => Resolution::Settled(Decision::Denied),
    }
}
