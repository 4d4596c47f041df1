//! Committed orders: the durable record of an accepted purchase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::{OrderId, SaleId, UserId};

/// A row in the durable order log.
///
/// Orders are created exclusively by the admission pipeline and never
/// mutated afterwards. At most one row exists per `(sale_id, user_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Row id assigned by the order log on commit.
    pub id: OrderId,
    /// Sale the order belongs to.
    pub sale_id: SaleId,
    /// Buyer that placed the order.
    pub user_id: UserId,
    /// Outcome recorded for the attempt.
    pub status: OrderStatus,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// Recorded outcome of a purchase attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// The purchase was accepted and a unit consumed.
    Success,
    /// The attempt was recorded as failed.
    Failed,
}

impl OrderStatus {
    /// Returns the wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Parses the wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when the value is not a known status; the
    /// order log only ever stores values produced by [`Self::as_str`].
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(Error::internal(format!("unknown order status {other:?}"))),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
