//! Reset, bootstrap, and reconciliation procedures.
//!
//! The coordinator is repairable state: everything it holds can be recomputed
//! from the order log. These procedures do exactly that, at startup, after a
//! coordinator failover, and on administrative reset.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use surge_core::coordinator::FastCoordinator;
use surge_core::observability::reconcile_span;
use surge_core::orderlog::OrderLog;
use surge_core::sale::Sale;
use surge_core::SaleId;

use crate::error::{EngineError, Result};
use crate::metrics::record_marks_recovered;

/// Rebuilds coordinator state from the order log.
#[derive(Clone)]
pub struct Reconciler {
    coordinator: Arc<dyn FastCoordinator>,
    orders: Arc<dyn OrderLog>,
    mark_ttl: Duration,
}

impl Reconciler {
    /// Creates a reconciler over the given stores.
    #[must_use]
    pub fn new(
        coordinator: Arc<dyn FastCoordinator>,
        orders: Arc<dyn OrderLog>,
        mark_ttl: Duration,
    ) -> Self {
        Self {
            coordinator,
            orders,
            mark_ttl,
        }
    }

    /// Seeds the coordinator counter for the configured default sale at
    /// startup.
    ///
    /// Returns the initialized remaining stock, or `None` when the sale does
    /// not exist yet. A missing sale is not an error; reads answer not-found
    /// until an operator creates it.
    ///
    /// # Errors
    ///
    /// Propagates store failures other than a missing sale.
    pub async fn bootstrap(&self, sale_id: &SaleId) -> Result<Option<i64>> {
        let span = reconcile_span("bootstrap", sale_id.as_str());
        async {
            let Some(sale) = self.orders.get_sale(sale_id).await? else {
                tracing::warn!(sale = %sale_id, "default sale not found; skipping stock bootstrap");
                return Ok(None);
            };
            let remaining = self.remaining_from_log(&sale).await?;
            self.coordinator.set_stock(sale_id, remaining).await?;
            tracing::info!(sale = %sale_id, remaining = remaining, "stock counter bootstrapped");
            Ok(Some(remaining))
        }
        .instrument(span)
        .await
    }

    /// Recomputes remaining stock from the order log and overwrites the
    /// coordinator counter.
    ///
    /// Operator-only: invoking this while purchases are in flight can cause
    /// transient over-acceptance, because in-flight decrements are not
    /// reflected in the recomputed value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the sale does not exist.
    pub async fn init_stock(&self, sale_id: &SaleId) -> Result<i64> {
        let span = reconcile_span("init_stock", sale_id.as_str());
        async {
            let sale = self.require_sale(sale_id).await?;
            let remaining = self.remaining_from_log(&sale).await?;
            self.coordinator.set_stock(sale_id, remaining).await?;
            tracing::info!(sale = %sale_id, remaining = remaining, "stock counter reinitialised");
            Ok(remaining)
        }
        .instrument(span)
        .await
    }

    /// Rebuilds the advisory marks for every committed buyer.
    ///
    /// Idempotent; used after a coordinator failover. Returns the number of
    /// marks written.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the sale does not exist.
    pub async fn recover_user_marks(&self, sale_id: &SaleId) -> Result<usize> {
        let span = reconcile_span("recover_user_marks", sale_id.as_str());
        async {
            self.require_sale(sale_id).await?;
            let users = self.orders.list_success_users(sale_id).await?;
            for user in &users {
                self.coordinator
                    .set_mark(sale_id, user, self.mark_ttl)
                    .await?;
            }
            record_marks_recovered(users.len() as u64);
            tracing::info!(sale = %sale_id, restored = users.len(), "user marks recovered");
            Ok(users.len())
        }
        .instrument(span)
        .await
    }

    /// Administrative reset: new total stock, no orders, clean coordinator.
    ///
    /// Only used for tests and controlled relaunches. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the sale does not exist.
    pub async fn reset(&self, sale_id: &SaleId, stock: u32) -> Result<()> {
        let span = reconcile_span("reset", sale_id.as_str());
        async {
            self.orders.set_total_stock(sale_id, stock).await?;
            let removed = self.orders.delete_orders(sale_id).await?;
            self.coordinator.reset(sale_id).await?;
            self.coordinator
                .set_stock(sale_id, i64::from(stock))
                .await?;
            tracing::info!(
                sale = %sale_id,
                stock = stock,
                orders_removed = removed,
                "sale reset"
            );
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn require_sale(&self, sale_id: &SaleId) -> Result<Sale> {
        self.orders
            .get_sale(sale_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                message: format!("sale not found: {sale_id}"),
            })
    }

    /// `total_stock − count(SUCCESS)`, floored at zero.
    async fn remaining_from_log(&self, sale: &Sale) -> Result<i64> {
        let committed = self.orders.count_success(&sale.id).await?;
        let total = i64::from(sale.total_stock);
        Ok((total - i64::try_from(committed).unwrap_or(i64::MAX)).max(0))
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("coordinator", &"<FastCoordinator>")
            .field("orders", &"<OrderLog>")
            .field("mark_ttl", &self.mark_ttl)
            .finish()
    }
}
