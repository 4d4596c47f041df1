//! The purchase admission pipeline.
//!
//! Coordinates the in-memory stock counter and user marks with the durable
//! order log so that, under arbitrary concurrency, accepted purchases never
//! exceed stock, each buyer obtains at most one unit per sale, and every
//! accepted purchase is durably recorded.
//!
//! # Protocol
//!
//! Per request: sale lookup → fast mark check → atomic decrement → oversell
//! guard → mark write → durable insert, with compensating coordinator
//! operations when a later step fails. There is no distributed transaction
//! and no shared lock: mutual exclusion lives entirely in the coordinator's
//! atomic counter and the order log's uniqueness constraint. The ordering is
//! deliberate:
//!
//! - Decrement before insert converts the hot-path contention into a single
//!   atomic operation on the counter.
//! - Mark before insert narrows the window in which two concurrent requests
//!   from the same user both reach the insert (one still loses to the
//!   uniqueness constraint, but the loser would have double-decremented and
//!   needs compensation).

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use tracing::Instrument;

use surge_core::coordinator::FastCoordinator;
use surge_core::observability::admission_span;
use surge_core::order::{Order, OrderStatus};
use surge_core::orderlog::OrderLog;
use surge_core::sale::SalePhase;
use surge_core::{SaleId, UserId};

use crate::error::{EngineError, Result};
use crate::metrics::{record_compensation_failure, record_purchase_result, PURCHASE_DURATION};

/// Outcome of a purchase attempt.
///
/// These are normal business results; infrastructure failures surface as
/// [`EngineError`] instead.
#[derive(Debug, Clone)]
pub enum PurchaseDecision {
    /// A unit was consumed and the order committed.
    Success {
        /// The committed order.
        order: Order,
        /// Counter value observed at the accepting decrement.
        remaining_stock: i64,
    },
    /// The buyer already holds a unit in this sale.
    AlreadyPurchased {
        /// The committed order, when the rejection came from the order log.
        order: Option<Order>,
    },
    /// No stock remained at the decrement.
    SoldOut,
    /// The sale window does not contain the current instant.
    NotActive {
        /// Whether the sale is upcoming or ended.
        phase: SalePhase,
    },
    /// No sale exists with the requested id.
    NotFound,
}

impl PurchaseDecision {
    /// Stable label for metrics and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::AlreadyPurchased { .. } => "already_purchased",
            Self::SoldOut => "sold_out",
            Self::NotActive { .. } => "not_active",
            Self::NotFound => "not_found",
        }
    }
}

/// Stateless admission pipeline shared by all request workers.
///
/// Cloning is cheap; all state lives in the coordinator and the order log.
#[derive(Clone)]
pub struct Admission {
    coordinator: Arc<dyn FastCoordinator>,
    orders: Arc<dyn OrderLog>,
    mark_ttl: Duration,
}

impl Admission {
    /// Creates a pipeline over the given stores.
    ///
    /// `mark_ttl` should slightly exceed the sale window (default ~24h) so
    /// marks outlive the sale but do not accumulate forever.
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

    /// Executes one purchase attempt for `(sale, user)`.
    ///
    /// The pipeline runs on a detached task: once the decrement has happened
    /// the request always resolves to a commit or a compensation, even if the
    /// caller's transport goes away mid-flight. Abandoning a debited counter
    /// would silently shrink the effective stock.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Coordinator`] when the coordinator is
    /// unreachable at the decrement, and [`EngineError::Durable`] /
    /// [`EngineError::DurableFatal`] when the order-log insert fails after
    /// compensation.
    pub async fn purchase(&self, sale_id: &SaleId, user_id: &UserId) -> Result<PurchaseDecision> {
        let started = Instant::now();
        let span = admission_span("purchase", sale_id.as_str(), user_id.as_str());
        let pipeline = self.clone();
        let sale = sale_id.clone();
        let user = user_id.clone();

        let outcome = tokio::spawn(
            async move { pipeline.run(&sale, &user).await }.instrument(span),
        )
        .await
        .map_err(|err| EngineError::Internal {
            message: format!("admission task failed: {err}"),
        })?;

        histogram!(PURCHASE_DURATION).record(started.elapsed().as_secs_f64());
        match &outcome {
            Ok(decision) => record_purchase_result(decision.label()),
            Err(_) => record_purchase_result("error"),
        }
        outcome
    }

    async fn run(&self, sale_id: &SaleId, user_id: &UserId) -> Result<PurchaseDecision> {
        // Step 1: sale lookup and window check.
        let Some(sale) = self.orders.get_sale(sale_id).await? else {
            return Ok(PurchaseDecision::NotFound);
        };
        let phase = sale.phase_at(chrono::Utc::now());
        if phase != SalePhase::Active {
            return Ok(PurchaseDecision::NotActive { phase });
        }

        // Step 2: fast rejection via the advisory mark. When the coordinator
        // is unreachable the order log answers instead; a missing mark never
        // contradicts a committed order.
        match self.coordinator.has_mark(sale_id, user_id).await {
            Ok(true) => return Ok(PurchaseDecision::AlreadyPurchased { order: None }),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(
                    sale = %sale_id,
                    user = %user_id,
                    error = %err,
                    "mark check unavailable; falling back to order log"
                );
                if let Some(order) = self.orders.find_success_order(sale_id, user_id).await? {
                    return Ok(PurchaseDecision::AlreadyPurchased { order: Some(order) });
                }
            }
        }

        // Step 3: the admission point. Without the atomic decrement there is
        // no oversell guarantee, so coordinator failure here aborts the
        // request; nothing has changed yet and no compensation is needed.
        let remaining = self.coordinator.decr_stock(sale_id).await?;

        // Step 4: oversell guard. Acceptance gates strictly on the observed
        // value; the transient negative is visible to no accepted purchase.
        if remaining < 0 {
            self.restore_unit(sale_id, "sold_out").await;
            return Ok(PurchaseDecision::SoldOut);
        }

        // Step 5: write the mark ahead of the insert. The mark is advisory;
        // if the write fails the insert still decides the outcome.
        let mark_written = match self
            .coordinator
            .set_mark(sale_id, user_id, self.mark_ttl)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    sale = %sale_id,
                    user = %user_id,
                    error = %err,
                    "mark write failed; proceeding to durable insert"
                );
                false
            }
        };

        // Step 6: durable insert. The uniqueness constraint is the ultimate
        // enforcer of one-per-buyer.
        match self
            .orders
            .insert_order(sale_id, user_id, OrderStatus::Success)
            .await
        {
            Ok(order) => {
                tracing::info!(
                    sale = %sale_id,
                    user = %user_id,
                    order = %order.id,
                    remaining = remaining,
                    "purchase committed"
                );
                Ok(PurchaseDecision::Success {
                    order,
                    remaining_stock: remaining,
                })
            }
            Err(surge_core::Error::DuplicateOrder { .. }) => {
                // A concurrent request from the same user committed first.
                // Restore the unit we provisionally consumed. The mark stays:
                // it belongs to the winning request and is correct.
                self.restore_unit(sale_id, "duplicate").await;
                Ok(PurchaseDecision::AlreadyPurchased { order: None })
            }
            Err(err) => {
                self.restore_unit(sale_id, "insert_failed").await;
                if mark_written {
                    if let Err(clear_err) = self.coordinator.clear_mark(sale_id, user_id).await {
                        tracing::error!(
                            sale = %sale_id,
                            user = %user_id,
                            error = %clear_err,
                            "compensating mark clear failed"
                        );
                        record_compensation_failure("clear_mark");
                    }
                }
                tracing::error!(
                    sale = %sale_id,
                    user = %user_id,
                    error = %err,
                    "order insert failed; stock restored"
                );
                Err(err.into())
            }
        }
    }

    /// Compensating increment. Failures are logged and surfaced as metrics
    /// but never retried synchronously; reconciliation repairs the drift.
    async fn restore_unit(&self, sale_id: &SaleId, reason: &'static str) {
        if let Err(err) = self.coordinator.incr_stock(sale_id).await {
            tracing::error!(
                sale = %sale_id,
                reason = reason,
                error = %err,
                "compensating stock increment failed"
            );
            record_compensation_failure("incr_stock");
        }
    }
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admission")
            .field("coordinator", &"<FastCoordinator>")
            .field("orders", &"<OrderLog>")
            .field("mark_ttl", &self.mark_ttl)
            .finish()
    }
}
