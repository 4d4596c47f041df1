//! Shared test utilities for Surge integration tests.
//!
//! This crate provides:
//! - [`FailingCoordinator`] / [`FailingOrderLog`]: store wrappers with
//!   configurable failure injection
//! - Factory functions for creating test sales and users
//!
//! # Example
//!
//! ```rust,ignore
//! use surge_test_utils::{fixtures, FailingOrderLog, OrderLogOp};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let stores = fixtures::TestStores::new();
//!     stores.seed_active_sale("flash", 100).await;
//!     // ... run test ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod failure;
pub mod fixtures;

pub use failure::{CoordinatorOp, FailingCoordinator, FailingOrderLog, OrderLogOp};
pub use fixtures::TestStores;
