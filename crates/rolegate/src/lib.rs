//! # Rolegate
//!
//! Authorization decisions for multi-tenant directories: is this user
//! entitled to this permission key?
//!
//! ## Overview
//!
//! Entitlement comes from three paths, any of which grants:
//!
//! - **Organization admin**: the admin holds every key in their organization
//! - **Group**: permissions assigned directly to the user's group
//! - **Role**: permissions of the user's role and, by inheritance, of every
//!   ancestor role
//!
//! Role inheritance can be evaluated live, by walking parents per check, or
//! from a materialized closure table rebuilt per organization. The
//! [`Gate`] picks between them according to its [`Strategy`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rolegate::{Gate, GateConfig};
//! use rolegate::store::SqliteStore;
//!
//! async fn example(user_id: &str, org_id: &str) -> rolegate::Result<()> {
//!     let store = SqliteStore::open("rolegate.db")?;
//!     let gate = Gate::new(store, GateConfig::default())?;
//!
//!     // After the org's roles or grants change:
//!     gate.rebuild(org_id).await?;
//!
//!     if gate.can(user_id, "project:post").await? {
//!         // ...
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `rolegate::core` - Identifiers, entities, closure computation
//! - `rolegate::store` - Storage abstraction, SQLite and in-memory stores
//! - `rolegate::authz` - Evaluators and the closure builder

pub mod config;
pub mod error;
pub mod gate;

// Re-export component crates
pub use rolegate_authz as authz;
pub use rolegate_core as core;
pub use rolegate_store as store;

pub use config::{GateConfig, Strategy};
pub use error::{GateError, Result};
pub use gate::Gate;

pub use rolegate_authz::{Authorizer, Decision, EvaluationMode, Freshness, GrantPath, RebuildReport};
pub use rolegate_core::{
    ClosureDigest, Group, GroupId, Organization, OrganizationId, Permission, PermissionId, Role,
    RoleId, User, UserId,
};
