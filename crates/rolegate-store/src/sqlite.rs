//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. One connection sits
//! behind a mutex, and every multi-statement write runs in a transaction,
//! so a closure replace is never visible half-done.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use rolegate_core::{
    ensure_same_organization, ClosureDigest, ClosureEntry, Group, GroupId, IntegrityError,
    Organization, OrganizationId, Permission, PermissionId, Role, RoleId, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::memory::now_millis;
use crate::migration;
use crate::traits::{ClosureState, InsertResult, RoleGraphSnapshot, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn row_to_organization(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: OrganizationId::from_uuid(row.get("id")?),
        name: row.get("name")?,
        admin_id: row.get::<_, Option<Uuid>>("admin_id")?.map(UserId::from_uuid),
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.get("id")?),
        organization_id: OrganizationId::from_uuid(row.get("organization_id")?),
        name: row.get("name")?,
        group_id: row.get::<_, Option<Uuid>>("group_id")?.map(GroupId::from_uuid),
        role_id: row.get::<_, Option<Uuid>>("role_id")?.map(RoleId::from_uuid),
    })
}

fn row_to_group(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: GroupId::from_uuid(row.get("id")?),
        organization_id: OrganizationId::from_uuid(row.get("organization_id")?),
        name: row.get("name")?,
    })
}

fn row_to_role(row: &Row<'_>) -> rusqlite::Result<Role> {
    Ok(Role {
        id: RoleId::from_uuid(row.get("id")?),
        organization_id: OrganizationId::from_uuid(row.get("organization_id")?),
        name: row.get("name")?,
        parent_role_id: row
            .get::<_, Option<Uuid>>("parent_role_id")?
            .map(RoleId::from_uuid),
    })
}

fn row_to_permission(row: &Row<'_>) -> rusqlite::Result<Permission> {
    Ok(Permission {
        id: PermissionId::from_uuid(row.get("id")?),
        organization_id: OrganizationId::from_uuid(row.get("organization_id")?),
        key: row.get("key")?,
    })
}

fn row_to_closure_entry(row: &Row<'_>) -> rusqlite::Result<ClosureEntry> {
    Ok(ClosureEntry {
        role_id: RoleId::from_uuid(row.get("role_id")?),
        permission_id: PermissionId::from_uuid(row.get("permission_id")?),
        organization_id: OrganizationId::from_uuid(row.get("organization_id")?),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Lookups shared by reads and write validation
// ─────────────────────────────────────────────────────────────────────────────

fn load_organization(conn: &Connection, id: &OrganizationId) -> Result<Option<Organization>> {
    conn.query_row(
        "SELECT id, name, admin_id FROM organizations WHERE id = ?1",
        params![id.as_uuid()],
        row_to_organization,
    )
    .optional()
    .map_err(StoreError::from)
}

fn load_user(conn: &Connection, id: &UserId) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, organization_id, name, group_id, role_id FROM users WHERE id = ?1",
        params![id.as_uuid()],
        row_to_user,
    )
    .optional()
    .map_err(StoreError::from)
}

fn load_group(conn: &Connection, id: &GroupId) -> Result<Option<Group>> {
    conn.query_row(
        "SELECT id, organization_id, name FROM groups WHERE id = ?1",
        params![id.as_uuid()],
        row_to_group,
    )
    .optional()
    .map_err(StoreError::from)
}

fn load_role(conn: &Connection, id: &RoleId) -> Result<Option<Role>> {
    conn.query_row(
        "SELECT id, organization_id, name, parent_role_id FROM roles WHERE id = ?1",
        params![id.as_uuid()],
        row_to_role,
    )
    .optional()
    .map_err(StoreError::from)
}

fn load_permission(conn: &Connection, id: &PermissionId) -> Result<Option<Permission>> {
    conn.query_row(
        "SELECT id, organization_id, key FROM permissions WHERE id = ?1",
        params![id.as_uuid()],
        row_to_permission,
    )
    .optional()
    .map_err(StoreError::from)
}

fn require_organization(conn: &Connection, id: &OrganizationId) -> Result<Organization> {
    load_organization(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("organization {id}")))
}

fn require_role(conn: &Connection, id: &RoleId) -> Result<Role> {
    load_role(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("role {id}")))
}

fn require_group(conn: &Connection, id: &GroupId) -> Result<Group> {
    load_group(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("group {id}")))
}

fn require_permission(conn: &Connection, id: &PermissionId) -> Result<Permission> {
    load_permission(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("permission {id}")))
}

fn exists(conn: &Connection, sql: &str, id: &Uuid) -> Result<bool> {
    conn.query_row(sql, params![id], |row| row.get(0))
        .map_err(StoreError::from)
}

fn bump_revision(conn: &Connection, organization_id: &OrganizationId) -> Result<()> {
    conn.execute(
        "UPDATE organizations SET structure_revision = structure_revision + 1 WHERE id = ?1",
        params![organization_id.as_uuid()],
    )?;
    Ok(())
}

fn read_revision(conn: &Connection, organization_id: &OrganizationId) -> Result<Option<u64>> {
    let revision: Option<i64> = conn
        .query_row(
            "SELECT structure_revision FROM organizations WHERE id = ?1",
            params![organization_id.as_uuid()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(revision.map(|r| r as u64))
}

#[async_trait]
impl Store for SqliteStore {
    async fn organization(&self, id: &OrganizationId) -> Result<Option<Organization>> {
        let id = *id;
        self.blocking(move |conn| load_organization(conn, &id)).await
    }

    async fn user(&self, id: &UserId) -> Result<Option<User>> {
        let id = *id;
        self.blocking(move |conn| load_user(conn, &id)).await
    }

    async fn group(&self, id: &GroupId) -> Result<Option<Group>> {
        let id = *id;
        self.blocking(move |conn| load_group(conn, &id)).await
    }

    async fn role(&self, id: &RoleId) -> Result<Option<Role>> {
        let id = *id;
        self.blocking(move |conn| load_role(conn, &id)).await
    }

    async fn permission_by_key(
        &self,
        organization_id: &OrganizationId,
        key: &str,
    ) -> Result<Option<Permission>> {
        let organization_id = *organization_id;
        let key = key.to_string();

        self.blocking(move |conn| {
            conn.query_row(
                "SELECT id, organization_id, key FROM permissions
                 WHERE organization_id = ?1 AND key = ?2",
                params![organization_id.as_uuid(), key],
                row_to_permission,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn roles_in_organization(&self, organization_id: &OrganizationId) -> Result<Vec<Role>> {
        let organization_id = *organization_id;

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, organization_id, name, parent_role_id FROM roles
                 WHERE organization_id = ?1 ORDER BY id",
            )?;
            let roles = stmt
                .query_map(params![organization_id.as_uuid()], row_to_role)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(roles)
        })
        .await
    }

    async fn group_has_permission_key(&self, group_id: &GroupId, key: &str) -> Result<bool> {
        let group_id = *group_id;
        let key = key.to_string();

        self.blocking(move |conn| {
            let granted: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM group_permissions gp
                    JOIN groups g ON g.id = gp.group_id
                    JOIN permissions p ON p.id = gp.permission_id
                    WHERE gp.group_id = ?1
                      AND p.key = ?2
                      AND p.organization_id = g.organization_id
                )",
                params![group_id.as_uuid(), key],
                |row| row.get(0),
            )?;
            Ok(granted)
        })
        .await
    }

    async fn role_has_permission_key(&self, role_id: &RoleId, key: &str) -> Result<bool> {
        let role_id = *role_id;
        let key = key.to_string();

        self.blocking(move |conn| {
            let granted: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM role_permissions rp
                    JOIN roles r ON r.id = rp.role_id
                    JOIN permissions p ON p.id = rp.permission_id
                    WHERE rp.role_id = ?1
                      AND p.key = ?2
                      AND p.organization_id = r.organization_id
                )",
                params![role_id.as_uuid(), key],
                |row| row.get(0),
            )?;
            Ok(granted)
        })
        .await
    }

    async fn insert_organization(&self, organization: &Organization) -> Result<()> {
        let organization = organization.clone();

        self.blocking(move |conn| {
            if exists(
                conn,
                "SELECT EXISTS(SELECT 1 FROM organizations WHERE id = ?1)",
                organization.id.as_uuid(),
            )? {
                return Err(StoreError::Conflict(format!(
                    "organization {} already exists",
                    organization.id
                )));
            }
            if organization.admin_id.is_some() {
                // The admin must be a member, and no member can exist yet.
                return Err(StoreError::NotFound(format!(
                    "admin of new organization {}",
                    organization.id
                )));
            }
            conn.execute(
                "INSERT INTO organizations (id, name, admin_id, structure_revision)
                 VALUES (?1, ?2, NULL, 0)",
                params![organization.id.as_uuid(), organization.name],
            )?;
            Ok(())
        })
        .await
    }

    async fn set_organization_admin(
        &self,
        organization_id: &OrganizationId,
        admin_id: Option<UserId>,
    ) -> Result<()> {
        let organization_id = *organization_id;

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            require_organization(&tx, &organization_id)?;
            if let Some(admin) = admin_id {
                let user = load_user(&tx, &admin)?
                    .ok_or_else(|| StoreError::NotFound(format!("user {admin}")))?;
                ensure_same_organization(organization_id, &user)?;
            }
            tx.execute(
                "UPDATE organizations SET admin_id = ?2 WHERE id = ?1",
                params![
                    organization_id.as_uuid(),
                    admin_id.map(|id| *id.as_uuid())
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let user = user.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            if exists(
                &tx,
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                user.id.as_uuid(),
            )? {
                return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
            }
            require_organization(&tx, &user.organization_id)?;
            if let Some(group_id) = user.group_id {
                ensure_same_organization(user.organization_id, &require_group(&tx, &group_id)?)?;
            }
            if let Some(role_id) = user.role_id {
                ensure_same_organization(user.organization_id, &require_role(&tx, &role_id)?)?;
            }
            tx.execute(
                "INSERT INTO users (id, organization_id, name, group_id, role_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.as_uuid(),
                    user.organization_id.as_uuid(),
                    user.name,
                    user.group_id.map(|id| *id.as_uuid()),
                    user.role_id.map(|id| *id.as_uuid()),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn insert_group(&self, group: &Group) -> Result<()> {
        let group = group.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            if exists(
                &tx,
                "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1)",
                group.id.as_uuid(),
            )? {
                return Err(StoreError::Conflict(format!("group {} already exists", group.id)));
            }
            require_organization(&tx, &group.organization_id)?;
            tx.execute(
                "INSERT INTO groups (id, organization_id, name) VALUES (?1, ?2, ?3)",
                params![group.id.as_uuid(), group.organization_id.as_uuid(), group.name],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn insert_role(&self, role: &Role) -> Result<()> {
        let role = role.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            if exists(
                &tx,
                "SELECT EXISTS(SELECT 1 FROM roles WHERE id = ?1)",
                role.id.as_uuid(),
            )? {
                return Err(StoreError::Conflict(format!("role {} already exists", role.id)));
            }
            require_organization(&tx, &role.organization_id)?;
            if let Some(parent_id) = role.parent_role_id {
                ensure_same_organization(role.organization_id, &require_role(&tx, &parent_id)?)?;
            }
            tx.execute(
                "INSERT INTO roles (id, organization_id, name, parent_role_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    role.id.as_uuid(),
                    role.organization_id.as_uuid(),
                    role.name,
                    role.parent_role_id.map(|id| *id.as_uuid()),
                ],
            )?;
            bump_revision(&tx, &role.organization_id)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn set_role_parent(&self, role_id: &RoleId, parent: Option<RoleId>) -> Result<()> {
        let role_id = *role_id;

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let role = require_role(&tx, &role_id)?;
            if let Some(parent_id) = parent {
                ensure_same_organization(role.organization_id, &require_role(&tx, &parent_id)?)?;
            }
            tx.execute(
                "UPDATE roles SET parent_role_id = ?2 WHERE id = ?1",
                params![role_id.as_uuid(), parent.map(|id| *id.as_uuid())],
            )?;
            bump_revision(&tx, &role.organization_id)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<()> {
        let permission = permission.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            if exists(
                &tx,
                "SELECT EXISTS(SELECT 1 FROM permissions WHERE id = ?1)",
                permission.id.as_uuid(),
            )? {
                return Err(StoreError::Conflict(format!(
                    "permission {} already exists",
                    permission.id
                )));
            }
            require_organization(&tx, &permission.organization_id)?;
            let duplicate_key: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM permissions WHERE organization_id = ?1 AND key = ?2)",
                params![permission.organization_id.as_uuid(), permission.key],
                |row| row.get(0),
            )?;
            if duplicate_key {
                return Err(StoreError::Conflict(format!(
                    "permission key {:?} already exists in organization {}",
                    permission.key, permission.organization_id
                )));
            }
            tx.execute(
                "INSERT INTO permissions (id, organization_id, key) VALUES (?1, ?2, ?3)",
                params![
                    permission.id.as_uuid(),
                    permission.organization_id.as_uuid(),
                    permission.key,
                ],
            )?;
            bump_revision(&tx, &permission.organization_id)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn grant_group_permission(
        &self,
        group_id: &GroupId,
        permission_id: &PermissionId,
    ) -> Result<InsertResult> {
        let group_id = *group_id;
        let permission_id = *permission_id;

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let group = require_group(&tx, &group_id)?;
            ensure_same_organization(group.organization_id, &require_permission(&tx, &permission_id)?)?;
            let changed = tx.execute(
                "INSERT OR IGNORE INTO group_permissions (group_id, permission_id) VALUES (?1, ?2)",
                params![group_id.as_uuid(), permission_id.as_uuid()],
            )?;
            tx.commit()?;
            Ok(if changed == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn grant_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<InsertResult> {
        let role_id = *role_id;
        let permission_id = *permission_id;

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let role = require_role(&tx, &role_id)?;
            ensure_same_organization(role.organization_id, &require_permission(&tx, &permission_id)?)?;
            let changed = tx.execute(
                "INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?1, ?2)",
                params![role_id.as_uuid(), permission_id.as_uuid()],
            )?;
            if changed == 0 {
                return Ok(InsertResult::AlreadyExists);
            }
            bump_revision(&tx, &role.organization_id)?;
            tx.commit()?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn revoke_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<bool> {
        let role_id = *role_id;
        let permission_id = *permission_id;

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let role = require_role(&tx, &role_id)?;
            let removed = tx.execute(
                "DELETE FROM role_permissions WHERE role_id = ?1 AND permission_id = ?2",
                params![role_id.as_uuid(), permission_id.as_uuid()],
            )?;
            if removed == 0 {
                return Ok(false);
            }
            bump_revision(&tx, &role.organization_id)?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn structure_revision(&self, organization_id: &OrganizationId) -> Result<u64> {
        let organization_id = *organization_id;
        self.blocking(move |conn| Ok(read_revision(conn, &organization_id)?.unwrap_or(0)))
            .await
    }

    async fn role_graph_snapshot(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<RoleGraphSnapshot>> {
        let organization_id = *organization_id;

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let Some(revision) = read_revision(&tx, &organization_id)? else {
                return Ok(None);
            };

            let roles = {
                let mut stmt = tx.prepare(
                    "SELECT id, organization_id, name, parent_role_id FROM roles
                     WHERE organization_id = ?1 ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(params![organization_id.as_uuid()], row_to_role)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };

            let grants = {
                let mut stmt = tx.prepare(
                    "SELECT rp.role_id, rp.permission_id FROM role_permissions rp
                     JOIN roles r ON r.id = rp.role_id
                     WHERE r.organization_id = ?1
                     ORDER BY rp.role_id, rp.permission_id",
                )?;
                let rows = stmt
                    .query_map(params![organization_id.as_uuid()], |row| {
                        Ok((
                            RoleId::from_uuid(row.get(0)?),
                            PermissionId::from_uuid(row.get(1)?),
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };

            tx.commit()?;

            Ok(Some(RoleGraphSnapshot {
                organization_id,
                revision,
                roles,
                grants,
            }))
        })
        .await
    }

    async fn replace_closure(
        &self,
        organization_id: &OrganizationId,
        entries: &[ClosureEntry],
        source_revision: u64,
        digest: ClosureDigest,
    ) -> Result<ClosureState> {
        let organization_id = *organization_id;

        let mut unique = BTreeSet::new();
        for entry in entries {
            if entry.organization_id != organization_id {
                return Err(IntegrityError::CrossOrganization {
                    entity: format!("closure entry for role {}", entry.role_id),
                    expected: organization_id,
                    found: entry.organization_id,
                }
                .into());
            }
            unique.insert(*entry);
        }

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            require_organization(&tx, &organization_id)?;

            let previous: Option<i64> = tx
                .query_row(
                    "SELECT generation FROM closure_state WHERE organization_id = ?1",
                    params![organization_id.as_uuid()],
                    |row| row.get(0),
                )
                .optional()?;
            let generation = previous.map_or(0, |g| g as u64) + 1;

            tx.execute(
                "DELETE FROM closure_entries WHERE organization_id = ?1",
                params![organization_id.as_uuid()],
            )?;

            {
                let mut insert = tx.prepare(
                    "INSERT INTO closure_entries (role_id, permission_id, organization_id)
                     VALUES (?1, ?2, ?3)",
                )?;
                for entry in &unique {
                    insert.execute(params![
                        entry.role_id.as_uuid(),
                        entry.permission_id.as_uuid(),
                        entry.organization_id.as_uuid(),
                    ])?;
                }
            }

            let state = ClosureState {
                organization_id,
                generation,
                source_revision,
                entry_count: unique.len(),
                digest,
                rebuilt_at: now_millis(),
            };

            tx.execute(
                "INSERT INTO closure_state (
                    organization_id, generation, source_revision, entry_count, digest, rebuilt_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(organization_id) DO UPDATE SET
                    generation = excluded.generation,
                    source_revision = excluded.source_revision,
                    entry_count = excluded.entry_count,
                    digest = excluded.digest,
                    rebuilt_at = excluded.rebuilt_at",
                params![
                    organization_id.as_uuid(),
                    state.generation as i64,
                    state.source_revision as i64,
                    state.entry_count as i64,
                    state.digest.as_bytes().as_slice(),
                    state.rebuilt_at,
                ],
            )?;

            tx.commit()?;
            Ok(state)
        })
        .await
    }

    async fn closure_grants(&self, role_id: &RoleId, key: &str) -> Result<bool> {
        let role_id = *role_id;
        let key = key.to_string();

        self.blocking(move |conn| {
            let granted: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM closure_entries c
                    JOIN permissions p ON p.id = c.permission_id
                    WHERE c.role_id = ?1
                      AND p.key = ?2
                      AND p.organization_id = c.organization_id
                )",
                params![role_id.as_uuid(), key],
                |row| row.get(0),
            )?;
            Ok(granted)
        })
        .await
    }

    async fn closure_entries(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ClosureEntry>> {
        let organization_id = *organization_id;

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT role_id, permission_id, organization_id FROM closure_entries
                 WHERE organization_id = ?1
                 ORDER BY role_id, permission_id",
            )?;
            let entries = stmt
                .query_map(params![organization_id.as_uuid()], row_to_closure_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn closure_state(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<ClosureState>> {
        let organization_id = *organization_id;

        self.blocking(move |conn| {
            let row: Option<(i64, i64, i64, Vec<u8>, i64)> = conn
                .query_row(
                    "SELECT generation, source_revision, entry_count, digest, rebuilt_at
                     FROM closure_state WHERE organization_id = ?1",
                    params![organization_id.as_uuid()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )
                .optional()?;

            let Some((generation, source_revision, entry_count, digest, rebuilt_at)) = row else {
                return Ok(None);
            };
            let digest = ClosureDigest::try_from(digest.as_slice())
                .map_err(|_| StoreError::InvalidData("closure digest is not 32 bytes".into()))?;

            Ok(Some(ClosureState {
                organization_id,
                generation: generation as u64,
                source_revision: source_revision as u64,
                entry_count: entry_count as usize,
                digest,
                rebuilt_at,
            }))
        })
        .await
    }
}
