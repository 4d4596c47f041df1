//! # surge-engine
//!
//! The purchase admission pipeline for Surge, together with the
//! reconciliation procedures that keep the fast coordinator consistent with
//! the durable order log across crashes, failed writes, and race conditions.
//!
//! The design deliberately avoids a distributed transaction. The order log's
//! uniqueness constraint is the correctness anchor; the coordinator is a
//! performance accelerator whose drift is bounded and repairable by
//! [`Reconciler`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod admission;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod status;

pub use admission::{Admission, PurchaseDecision};
pub use error::{EngineError, Result};
pub use reconcile::Reconciler;
pub use status::{PurchaseCounts, SaleStats, SaleStatusView, StatusReader, UserPurchase};
