//! Store wrappers that inject failures at configurable operations.
//!
//! Used for testing compensation paths and crash recovery. Failures are
//! single-shot: configuring a failure affects the next matching call only,
//! so a test can fail one insert and observe the retry behave normally.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use surge_core::coordinator::{FastCoordinator, MemoryCoordinator};
use surge_core::error::{Error, Result};
use surge_core::id::{SaleId, UserId};
use surge_core::order::{Order, OrderStatus};
use surge_core::orderlog::{MemoryOrderLog, OrderCounts, OrderLog};
use surge_core::sale::Sale;

// ============================================================================
// FailingCoordinator
// ============================================================================

/// Coordinator operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CoordinatorOp {
    SetStock,
    GetStock,
    DecrStock,
    IncrStock,
    HasMark,
    SetMark,
    ClearMark,
    Reset,
    Ping,
}

/// Coordinator wrapper that injects transient failures.
#[derive(Debug, Default)]
pub struct FailingCoordinator {
    inner: MemoryCoordinator,
    fail_once: Arc<RwLock<HashSet<CoordinatorOp>>>,
    fail_all: AtomicBool,
}

impl FailingCoordinator {
    /// Creates a wrapper around an empty [`MemoryCoordinator`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped coordinator for direct state inspection.
    pub fn inner(&self) -> &MemoryCoordinator {
        &self.inner
    }

    /// Configures the next call to `op` to fail with a transient error.
    pub fn fail_on(&self, op: CoordinatorOp) {
        self.fail_once.write().unwrap().insert(op);
    }

    /// Configures all operations to fail (simulates total outage).
    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Restores normal operation after [`Self::fail_all`].
    pub fn heal(&self) {
        self.fail_all.store(false, Ordering::SeqCst);
        self.fail_once.write().unwrap().clear();
    }

    fn should_fail(&self, op: CoordinatorOp) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_once.write().unwrap().remove(&op)
    }

    fn injected(op: CoordinatorOp) -> Error {
        Error::coordinator(format!("injected coordinator failure: {op:?}"))
    }
}

#[async_trait]
impl FastCoordinator for FailingCoordinator {
    async fn set_stock(&self, sale: &SaleId, stock: i64) -> Result<()> {
        if self.should_fail(CoordinatorOp::SetStock) {
            return Err(Self::injected(CoordinatorOp::SetStock));
        }
        self.inner.set_stock(sale, stock).await
    }

    async fn get_stock(&self, sale: &SaleId) -> Result<Option<i64>> {
        if self.should_fail(CoordinatorOp::GetStock) {
            return Err(Self::injected(CoordinatorOp::GetStock));
        }
        self.inner.get_stock(sale).await
    }

    async fn decr_stock(&self, sale: &SaleId) -> Result<i64> {
        if self.should_fail(CoordinatorOp::DecrStock) {
            return Err(Self::injected(CoordinatorOp::DecrStock));
        }
        self.inner.decr_stock(sale).await
    }

    async fn incr_stock(&self, sale: &SaleId) -> Result<i64> {
        if self.should_fail(CoordinatorOp::IncrStock) {
            return Err(Self::injected(CoordinatorOp::IncrStock));
        }
        self.inner.incr_stock(sale).await
    }

    async fn has_mark(&self, sale: &SaleId, user: &UserId) -> Result<bool> {
        if self.should_fail(CoordinatorOp::HasMark) {
            return Err(Self::injected(CoordinatorOp::HasMark));
        }
        self.inner.has_mark(sale, user).await
    }

    async fn set_mark(&self, sale: &SaleId, user: &UserId, ttl: Duration) -> Result<()> {
        if self.should_fail(CoordinatorOp::SetMark) {
            return Err(Self::injected(CoordinatorOp::SetMark));
        }
        self.inner.set_mark(sale, user, ttl).await
    }

    async fn clear_mark(&self, sale: &SaleId, user: &UserId) -> Result<()> {
        if self.should_fail(CoordinatorOp::ClearMark) {
            return Err(Self::injected(CoordinatorOp::ClearMark));
        }
        self.inner.clear_mark(sale, user).await
    }

    async fn reset(&self, sale: &SaleId) -> Result<()> {
        if self.should_fail(CoordinatorOp::Reset) {
            return Err(Self::injected(CoordinatorOp::Reset));
        }
        self.inner.reset(sale).await
    }

    async fn ping(&self) -> Result<()> {
        if self.should_fail(CoordinatorOp::Ping) {
            return Err(Self::injected(CoordinatorOp::Ping));
        }
        self.inner.ping().await
    }
}

// ============================================================================
// FailingOrderLog
// ============================================================================

/// Order-log operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OrderLogOp {
    GetSale,
    CountSuccess,
    CountOrders,
    ListSuccessUsers,
    FindSuccessOrder,
    InsertOrder,
    DeleteOrders,
    SetTotalStock,
    UpdateWindow,
    Ping,
}

/// Order-log wrapper that injects transient or fatal failures.
#[derive(Debug, Default)]
pub struct FailingOrderLog {
    inner: MemoryOrderLog,
    fail_once: Arc<RwLock<HashSet<OrderLogOp>>>,
    fail_fatal_once: Arc<RwLock<HashSet<OrderLogOp>>>,
    fail_all: AtomicBool,
}

impl FailingOrderLog {
    /// Creates a wrapper around an empty [`MemoryOrderLog`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped log for direct seeding and inspection.
    pub fn inner(&self) -> &MemoryOrderLog {
        &self.inner
    }

    /// Configures the next call to `op` to fail with a transient error.
    pub fn fail_on(&self, op: OrderLogOp) {
        self.fail_once.write().unwrap().insert(op);
    }

    /// Configures the next call to `op` to fail with a fatal error.
    pub fn fail_fatal_on(&self, op: OrderLogOp) {
        self.fail_fatal_once.write().unwrap().insert(op);
    }

    /// Configures all operations to fail (simulates total outage).
    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Restores normal operation after [`Self::fail_all`].
    pub fn heal(&self) {
        self.fail_all.store(false, Ordering::SeqCst);
        self.fail_once.write().unwrap().clear();
        self.fail_fatal_once.write().unwrap().clear();
    }

    fn check(&self, op: OrderLogOp) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Error::durable(format!(
                "injected order log outage: {op:?}"
            )));
        }
        if self.fail_fatal_once.write().unwrap().remove(&op) {
            return Err(Error::durable_fatal(format!(
                "injected fatal order log failure: {op:?}"
            )));
        }
        if self.fail_once.write().unwrap().remove(&op) {
            return Err(Error::durable(format!(
                "injected order log failure: {op:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderLog for FailingOrderLog {
    async fn get_sale(&self, sale: &SaleId) -> Result<Option<Sale>> {
        self.check(OrderLogOp::GetSale)?;
        self.inner.get_sale(sale).await
    }

    async fn create_sale(&self, sale: Sale) -> Result<()> {
        self.inner.create_sale(sale).await
    }

    async fn count_success(&self, sale: &SaleId) -> Result<u64> {
        self.check(OrderLogOp::CountSuccess)?;
        self.inner.count_success(sale).await
    }

    async fn count_orders(&self, sale: &SaleId) -> Result<OrderCounts> {
        self.check(OrderLogOp::CountOrders)?;
        self.inner.count_orders(sale).await
    }

    async fn list_success_users(&self, sale: &SaleId) -> Result<Vec<UserId>> {
        self.check(OrderLogOp::ListSuccessUsers)?;
        self.inner.list_success_users(sale).await
    }

    async fn find_success_order(&self, sale: &SaleId, user: &UserId) -> Result<Option<Order>> {
        self.check(OrderLogOp::FindSuccessOrder)?;
        self.inner.find_success_order(sale, user).await
    }

    async fn insert_order(
        &self,
        sale: &SaleId,
        user: &UserId,
        status: OrderStatus,
    ) -> Result<Order> {
        self.check(OrderLogOp::InsertOrder)?;
        self.inner.insert_order(sale, user, status).await
    }

    async fn delete_orders(&self, sale: &SaleId) -> Result<u64> {
        self.check(OrderLogOp::DeleteOrders)?;
        self.inner.delete_orders(sale).await
    }

    async fn set_total_stock(&self, sale: &SaleId, total_stock: u32) -> Result<()> {
        self.check(OrderLogOp::SetTotalStock)?;
        self.inner.set_total_stock(sale, total_stock).await
    }

    async fn update_window(
        &self,
        sale: &SaleId,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Sale> {
        self.check(OrderLogOp::UpdateWindow)?;
        self.inner.update_window(sale, start_time, end_time).await
    }

    async fn ping(&self) -> Result<()> {
        self.check(OrderLogOp::Ping)?;
        self.inner.ping().await
    }
}
