//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::memory::now_millis;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(version = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Identifiers are 16-byte UUID blobs.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE organizations (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            admin_id BLOB,                        -- nullable, a user of this organization
            structure_revision INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE roles (
            id BLOB PRIMARY KEY,
            organization_id BLOB NOT NULL REFERENCES organizations(id),
            name TEXT NOT NULL,
            parent_role_id BLOB REFERENCES roles(id)
        );

        CREATE TABLE groups (
            id BLOB PRIMARY KEY,
            organization_id BLOB NOT NULL REFERENCES organizations(id),
            name TEXT NOT NULL
        );

        CREATE TABLE users (
            id BLOB PRIMARY KEY,
            organization_id BLOB NOT NULL REFERENCES organizations(id),
            name TEXT NOT NULL,
            group_id BLOB REFERENCES groups(id),
            role_id BLOB REFERENCES roles(id)
        );

        CREATE TABLE permissions (
            id BLOB PRIMARY KEY,
            organization_id BLOB NOT NULL REFERENCES organizations(id),
            key TEXT NOT NULL,

            UNIQUE(organization_id, key)
        );

        CREATE TABLE group_permissions (
            group_id BLOB NOT NULL REFERENCES groups(id),
            permission_id BLOB NOT NULL REFERENCES permissions(id),
            PRIMARY KEY (group_id, permission_id)
        );

        CREATE TABLE role_permissions (
            role_id BLOB NOT NULL REFERENCES roles(id),
            permission_id BLOB NOT NULL REFERENCES permissions(id),
            PRIMARY KEY (role_id, permission_id)
        );

        -- Derived: truncated and rebuilt per organization
        CREATE TABLE closure_entries (
            role_id BLOB NOT NULL REFERENCES roles(id),
            permission_id BLOB NOT NULL REFERENCES permissions(id),
            organization_id BLOB NOT NULL REFERENCES organizations(id),
            PRIMARY KEY (role_id, permission_id)
        );

        CREATE TABLE closure_state (
            organization_id BLOB PRIMARY KEY REFERENCES organizations(id),
            generation INTEGER NOT NULL,
            source_revision INTEGER NOT NULL,
            entry_count INTEGER NOT NULL,
            digest BLOB NOT NULL,                 -- 32 bytes, Blake3
            rebuilt_at INTEGER NOT NULL
        );

        CREATE INDEX idx_roles_organization ON roles(organization_id);
        CREATE INDEX idx_users_organization ON users(organization_id);
        CREATE INDEX idx_closure_organization ON closure_entries(organization_id);
        "#,
    )?;

    Ok(())
}
