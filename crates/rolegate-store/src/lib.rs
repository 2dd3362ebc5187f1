//! # Rolegate Store
//!
//! Storage abstraction for rolegate. Provides a trait-based interface to
//! the directory (organizations, users, groups, roles, permissions) and
//! to the materialized role-permission closure, with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`ClosureState`] - Generation, source revision and digest of a closure
//! - [`RoleGraphSnapshot`] - Roles and role grants read at one revision
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rolegate_core::Organization;
//! use rolegate_store::{SqliteStore, Store};
//!
//! async fn example() -> rolegate_store::Result<()> {
//!     let store = SqliteStore::open("rolegate.db")?;
//!
//!     let org = Organization::new("ACME Inc.");
//!     store.insert_organization(&org).await?;
//!
//!     assert_eq!(store.structure_revision(&org.id).await?, 0);
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent grants**: Granting the same permission twice returns `AlreadyExists`
//! - **Unique keys**: A permission key is unique within its organization
//! - **Revisions**: Hierarchy and role-grant writes bump the organization's revision
//! - **Atomic replace**: A closure is swapped whole, never observed half-written

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ClosureState, InsertResult, RoleGraphSnapshot, Store};
