//! Host crate for Surge's cross-crate scenario tests.
//!
//! The scenarios under `tests/` drive the whole stack at once (HTTP router,
//! admission pipeline, coordinator, order log), so they belong to no single
//! crate. Cargo only discovers `tests/` directories inside a package, and the
//! workspace root is a virtual manifest, so this otherwise-empty package
//! carries them.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
