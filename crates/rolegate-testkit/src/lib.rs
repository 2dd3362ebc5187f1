//! # Rolegate Testkit
//!
//! Testing utilities for rolegate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an organization bound to a store, with helpers to add
//!   roles, groups, permissions and users, and the admin, group and
//!   inheritance scenarios
//! - **Generators**: proptest strategies for acyclic role forests and a
//!   helper that writes a generated forest into any [`Store`](rolegate_store::Store)
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rolegate_store::MemoryStore;
//! use rolegate_testkit::fixtures::inheritance_scenario;
//!
//! async fn example() {
//!     let scenario = inheritance_scenario(Arc::new(MemoryStore::new())).await.unwrap();
//!     let carol = scenario.user;
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use rolegate_testkit::generators::ForestParams;
//!
//! proptest! {
//!     #[test]
//!     fn closure_matches_reference(params: ForestParams) {
//!         // populate, rebuild, compare against params.reaches(..)
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{admin_scenario, group_scenario, inheritance_scenario, OrgFixture, Scenario};
pub use generators::{forest_organization, populate_forest, role_forest, ForestParams, PopulatedForest};
