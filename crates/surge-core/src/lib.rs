//! # surge-core
//!
//! Core abstractions for the Surge flash-sale purchase engine.
//!
//! This crate provides the foundational types and traits used across all
//! Surge components:
//!
//! - **Identifiers**: Validated, strongly-typed ids for sales, users, and orders
//! - **Data Model**: Sale metadata, sale-phase derivation, committed orders
//! - **Coordinator Trait**: The shared atomic stock counter and user marks
//! - **Order Log Trait**: The durable source of truth for accepted purchases
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `surge-core` is the **only** crate allowed to define shared primitives.
//! The admission pipeline, the storage backends, and the HTTP surface all
//! interact through the contracts defined here.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod coordinator;
pub mod error;
pub mod id;
pub mod observability;
pub mod order;
pub mod orderlog;
pub mod sale;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use surge_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::coordinator::{FastCoordinator, MemoryCoordinator};
    pub use crate::error::{Error, Result};
    pub use crate::id::{OrderId, SaleId, UserId};
    pub use crate::order::{Order, OrderStatus};
    pub use crate::orderlog::{MemoryOrderLog, OrderCounts, OrderLog};
    pub use crate::sale::{Sale, SalePhase};
}

// Re-export key types at crate root for ergonomics
pub use coordinator::{FastCoordinator, MemoryCoordinator};
pub use error::{Error, Result};
pub use id::{OrderId, SaleId, UserId, MAX_SALE_ID_LEN, MAX_USER_ID_LEN};
pub use observability::{init_logging, LogFormat};
pub use order::{Order, OrderStatus};
pub use orderlog::{MemoryOrderLog, OrderCounts, OrderLog};
pub use sale::{Sale, SalePhase};
