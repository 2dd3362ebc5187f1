//! # Rolegate Authz
//!
//! Entitlement evaluation and role closure rebuilds.
//!
//! ## Overview
//!
//! A user is entitled to a permission key when any of three paths grants
//! it, tried in order:
//!
//! 1. **Admin**: the user is their organization's admin (any key)
//! 2. **Group**: the user's group holds a permission with that key
//! 3. **Role**: the user's role holds it, directly or by inheritance
//!
//! Unknown users, roles and keys are denials, not errors.
//!
//! ## Evaluators
//!
//! - [`LiveEvaluator`] - walks the role hierarchy at query time, in
//!   [`EvaluationMode::Direct`] or [`EvaluationMode::Inherited`]
//! - [`MaterializedEvaluator`] - one lookup in the closure table built by
//!   [`ClosureBuilder`]
//!
//! Both agree whenever the organization's closure is fresh, which
//! [`MaterializedEvaluator::freshness`] reports.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rolegate_authz::{Authorizer, ClosureBuilder, MaterializedEvaluator};
//! use rolegate_core::{OrganizationId, UserId};
//! use rolegate_store::MemoryStore;
//!
//! async fn example(org: OrganizationId, user: UserId) -> rolegate_authz::Result<bool> {
//!     let store = Arc::new(MemoryStore::new());
//!
//!     ClosureBuilder::new(store.clone()).rebuild(&org).await?;
//!     MaterializedEvaluator::new(store).can(&user, "project:post").await
//! }
//! ```

pub mod builder;
pub mod decision;
pub mod error;
pub mod live;
pub mod materialized;
mod subject;

pub use builder::{ClosureBuilder, RebuildReport};
pub use decision::{Authorizer, Decision, EvaluationMode, GrantPath};
pub use error::{AuthzError, Result};
pub use live::LiveEvaluator;
pub use materialized::{Freshness, MaterializedEvaluator};
