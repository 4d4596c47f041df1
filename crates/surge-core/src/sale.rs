//! Sale metadata and the sale-window phase derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::SaleId;

/// A time-bounded sale offering a fixed number of identical units.
///
/// `total_stock` is immutable for the lifetime of a sale except through an
/// explicit administrative reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    /// Stable sale identifier.
    pub id: SaleId,
    /// Human-readable sale name.
    pub name: String,
    /// Instant at which purchases become admissible (inclusive).
    pub start_time: DateTime<Utc>,
    /// Instant after which purchases are no longer admissible (inclusive).
    pub end_time: DateTime<Utc>,
    /// Number of units offered.
    pub total_stock: u32,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last administrative update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Derives the sale phase at the given instant.
    ///
    /// The window is inclusive on both ends: a purchase at exactly
    /// `start_time` or `end_time` is admissible.
    #[must_use]
    pub fn phase_at(&self, now: DateTime<Utc>) -> SalePhase {
        if self.start_time > now {
            SalePhase::Upcoming
        } else if now > self.end_time {
            SalePhase::Ended
        } else {
            SalePhase::Active
        }
    }

    /// Returns true when the sale window contains the given instant.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.phase_at(now) == SalePhase::Active
    }
}

/// Phase of a sale relative to its window, derived from wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalePhase {
    /// `start_time` is in the future.
    Upcoming,
    /// The current instant is inside the window.
    Active,
    /// `end_time` has passed.
    Ended,
}

impl SalePhase {
    /// Returns the wire representation of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "UPCOMING",
            Self::Active => "ACTIVE",
            Self::Ended => "ENDED",
        }
    }
}

impl std::fmt::Display for SalePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
