//! Fast coordinator abstraction: the shared atomic counter and user marks.
//!
//! The coordinator is the in-memory side of the admission protocol. It exists
//! because the durable order log cannot sustain the arrival rate of
//! decrements; the coordinator turns a write-heavy contention point on a
//! single row into a single-address atomic counter. It is an accelerator,
//! not a source of truth: every fact it holds can be rebuilt from the order
//! log.
//!
//! ## Contract
//!
//! Each operation is atomic and linearisable with respect to other callers
//! of the same key. No ordering is guaranteed between operations. Every
//! operation may fail with a transient [`Error::Coordinator`] when the
//! backing service is unreachable; callers decide per call site whether that
//! aborts the request or falls back to the order log.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::id::{SaleId, UserId};

/// Atomic stock counter and per-sale user marks.
#[async_trait]
pub trait FastCoordinator: Send + Sync + 'static {
    /// Unconditionally sets the stock counter for a sale.
    ///
    /// Used by bootstrap and reset only; the admission path never writes the
    /// counter except through [`Self::decr_stock`] / [`Self::incr_stock`].
    async fn set_stock(&self, sale: &SaleId, stock: i64) -> Result<()>;

    /// Reads the stock counter, or `None` when no counter exists for the sale.
    async fn get_stock(&self, sale: &SaleId) -> Result<Option<i64>>;

    /// Atomically decrements the stock counter and returns the new value.
    ///
    /// A missing counter counts from zero, so the first decrement of an
    /// unbootstrapped sale yields `-1`. The value is deliberately allowed to
    /// go negative; acceptance gates on the returned value, and clamping
    /// would break the compensation arithmetic.
    async fn decr_stock(&self, sale: &SaleId) -> Result<i64>;

    /// Atomically increments the stock counter and returns the new value.
    ///
    /// This is the compensation path for rejected or failed purchases.
    async fn incr_stock(&self, sale: &SaleId) -> Result<i64>;

    /// Returns true when a purchase mark exists for `(sale, user)`.
    ///
    /// The mark is advisory: its absence never contradicts a committed order.
    async fn has_mark(&self, sale: &SaleId, user: &UserId) -> Result<bool>;

    /// Sets the purchase mark for `(sale, user)` with the given TTL.
    ///
    /// Idempotent; a repeated set refreshes the TTL.
    async fn set_mark(&self, sale: &SaleId, user: &UserId, ttl: Duration) -> Result<()>;

    /// Removes the purchase mark for `(sale, user)`.
    ///
    /// Compensation path only; a mark backed by a committed order is never
    /// cleared.
    async fn clear_mark(&self, sale: &SaleId, user: &UserId) -> Result<()>;

    /// Deletes the stock counter and all marks for a sale.
    async fn reset(&self, sale: &SaleId) -> Result<()>;

    /// Probes connectivity to the backing service.
    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct CoordinatorState {
    stock: HashMap<String, i64>,
    /// sale id -> user id -> mark expiry.
    marks: HashMap<String, HashMap<String, Instant>>,
}

/// In-memory coordinator.
///
/// Thread-safe via `RwLock`; linearisability follows from the exclusive
/// write lock around each mutation. Suitable for tests and single-process
/// deployments. Expired marks are dropped lazily when the holding map is
/// next written.
#[derive(Debug, Clone, Default)]
pub struct MemoryCoordinator {
    state: Arc<RwLock<CoordinatorState>>,
}

impl MemoryCoordinator {
    /// Creates a new empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, CoordinatorState>> {
        self.state.read().map_err(|_| Error::Internal {
            message: "coordinator lock poisoned".into(),
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, CoordinatorState>> {
        self.state.write().map_err(|_| Error::Internal {
            message: "coordinator lock poisoned".into(),
        })
    }
}

#[async_trait]
impl FastCoordinator for MemoryCoordinator {
    async fn set_stock(&self, sale: &SaleId, stock: i64) -> Result<()> {
        let mut state = self.write()?;
        state.stock.insert(sale.as_str().to_string(), stock);
        Ok(())
    }

    async fn get_stock(&self, sale: &SaleId) -> Result<Option<i64>> {
        let state = self.read()?;
        Ok(state.stock.get(sale.as_str()).copied())
    }

    async fn decr_stock(&self, sale: &SaleId) -> Result<i64> {
        let mut state = self.write()?;
        let value = state.stock.entry(sale.as_str().to_string()).or_insert(0);
        *value -= 1;
        Ok(*value)
    }

    async fn incr_stock(&self, sale: &SaleId) -> Result<i64> {
        let mut state = self.write()?;
        let value = state.stock.entry(sale.as_str().to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn has_mark(&self, sale: &SaleId, user: &UserId) -> Result<bool> {
        let state = self.read()?;
        Ok(state
            .marks
            .get(sale.as_str())
            .and_then(|users| users.get(user.as_str()))
            .is_some_and(|expiry| *expiry > Instant::now()))
    }

    async fn set_mark(&self, sale: &SaleId, user: &UserId, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let expiry = now.checked_add(ttl).unwrap_or(now);
        let mut state = self.write()?;
        let users = state.marks.entry(sale.as_str().to_string()).or_default();
        users.retain(|_, e| *e > now);
        users.insert(user.as_str().to_string(), expiry);
        Ok(())
    }

    async fn clear_mark(&self, sale: &SaleId, user: &UserId) -> Result<()> {
        let mut state = self.write()?;
        if let Some(users) = state.marks.get_mut(sale.as_str()) {
            users.remove(user.as_str());
        }
        Ok(())
    }

    async fn reset(&self, sale: &SaleId) -> Result<()> {
        let mut state = self.write()?;
        state.stock.remove(sale.as_str());
        state.marks.remove(sale.as_str());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.read().map(|_| ())
    }
}
