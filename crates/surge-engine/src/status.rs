//! Read-side views: sale status, buyer lookup, and purchase statistics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use surge_core::coordinator::FastCoordinator;
use surge_core::order::Order;
use surge_core::orderlog::OrderLog;
use surge_core::sale::{Sale, SalePhase};
use surge_core::{SaleId, UserId};

use crate::error::Result;

/// Point-in-time status of a sale.
#[derive(Debug, Clone, Serialize)]
pub struct SaleStatusView {
    /// Sale identifier.
    pub sale_id: SaleId,
    /// Sale name.
    pub name: String,
    /// Phase at the time of the read.
    pub status: SalePhase,
    /// Remaining units; from the coordinator, with an order-log fallback.
    pub remaining_stock: i64,
    /// Configured stock.
    pub total_stock: u32,
    /// Window start.
    pub start_time: DateTime<Utc>,
    /// Window end.
    pub end_time: DateTime<Utc>,
}

/// Whether a buyer holds a unit, and the committed order if so.
#[derive(Debug, Clone, Serialize)]
pub struct UserPurchase {
    /// True when a `SUCCESS` order exists for the pair.
    pub purchased: bool,
    /// The committed order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

/// Order counts for a sale.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PurchaseCounts {
    /// Rows with status `SUCCESS`.
    pub success_count: u64,
    /// Rows with status `FAILED`.
    pub failed_count: u64,
    /// All rows.
    pub total_count: u64,
}

/// Sale status plus purchase counts.
#[derive(Debug, Clone, Serialize)]
pub struct SaleStats {
    /// Current sale status.
    pub sale: SaleStatusView,
    /// Order counts.
    pub purchases: PurchaseCounts,
}

/// Read-only view layer over the coordinator and the order log.
#[derive(Clone)]
pub struct StatusReader {
    coordinator: Arc<dyn FastCoordinator>,
    orders: Arc<dyn OrderLog>,
}

impl StatusReader {
    /// Creates a reader over the given stores.
    #[must_use]
    pub fn new(coordinator: Arc<dyn FastCoordinator>, orders: Arc<dyn OrderLog>) -> Self {
        Self {
            coordinator,
            orders,
        }
    }

    /// Reads the current status of a sale, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Propagates order-log failures; coordinator failures degrade to the
    /// order-log fallback instead of erroring.
    pub async fn sale_status(&self, sale_id: &SaleId) -> Result<Option<SaleStatusView>> {
        let Some(sale) = self.orders.get_sale(sale_id).await? else {
            return Ok(None);
        };
        let remaining = self.remaining_stock(&sale).await?;
        Ok(Some(SaleStatusView {
            sale_id: sale.id.clone(),
            name: sale.name.clone(),
            status: sale.phase_at(Utc::now()),
            remaining_stock: remaining,
            total_stock: sale.total_stock,
            start_time: sale.start_time,
            end_time: sale.end_time,
        }))
    }

    /// Answers whether a buyer holds a unit in the sale.
    ///
    /// Reads the order log directly; the advisory mark is not consulted, so
    /// the answer is authoritative even right after a coordinator wipe.
    ///
    /// # Errors
    ///
    /// Propagates order-log failures.
    pub async fn user_purchase(&self, sale_id: &SaleId, user_id: &UserId) -> Result<UserPurchase> {
        let order = self.orders.find_success_order(sale_id, user_id).await?;
        Ok(UserPurchase {
            purchased: order.is_some(),
            order,
        })
    }

    /// Reads sale status and purchase counts, or `None` when the sale does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Propagates order-log failures.
    pub async fn stats(&self, sale_id: &SaleId) -> Result<Option<SaleStats>> {
        let Some(sale) = self.sale_status(sale_id).await? else {
            return Ok(None);
        };
        let counts = self.orders.count_orders(sale_id).await?;
        Ok(Some(SaleStats {
            sale,
            purchases: PurchaseCounts {
                success_count: counts.success,
                failed_count: counts.failed,
                total_count: counts.total(),
            },
        }))
    }

    /// Remaining stock for display: the live counter when the coordinator
    /// answers, otherwise `total − count(SUCCESS)` floored at zero.
    async fn remaining_stock(&self, sale: &Sale) -> Result<i64> {
        match self.coordinator.get_stock(&sale.id).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    sale = %sale.id,
                    error = %err,
                    "coordinator unavailable; deriving remaining stock from order log"
                );
            }
        }
        let committed = self.orders.count_success(&sale.id).await?;
        let total = i64::from(sale.total_stock);
        Ok((total - i64::try_from(committed).unwrap_or(i64::MAX)).max(0))
    }
}

impl std::fmt::Debug for StatusReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReader")
            .field("coordinator", &"<FastCoordinator>")
            .field("orders", &"<OrderLog>")
            .finish()
    }
}
