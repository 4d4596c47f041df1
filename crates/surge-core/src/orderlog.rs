//! Durable order log abstraction: the source of truth for accepted purchases.
//!
//! The order log stores sale metadata and the authoritative order table. Its
//! uniqueness constraint on `(user_id, sale_id)` is the ultimate enforcer of
//! one-unit-per-buyer: even when the coordinator's advisory mark is lost, a
//! second insert for the same pair fails with [`Error::DuplicateOrder`] and
//! the admission pipeline compensates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::id::{OrderId, SaleId, UserId};
use crate::order::{Order, OrderStatus};
use crate::sale::Sale;

/// Success/failed row counts for a sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderCounts {
    /// Number of rows with status `SUCCESS`.
    pub success: u64,
    /// Number of rows with status `FAILED`.
    pub failed: u64,
}

impl OrderCounts {
    /// Total number of rows.
    #[must_use]
    pub const fn total(self) -> u64 {
        self.success + self.failed
    }
}

/// Append-only store of committed orders plus sale metadata.
///
/// Committed inserts are durable. Operations fail with transient
/// [`Error::Durable`] on connectivity problems and [`Error::DurableFatal`]
/// otherwise.
#[async_trait]
pub trait OrderLog: Send + Sync + 'static {
    /// Reads sale metadata, or `None` when the sale does not exist.
    async fn get_sale(&self, sale: &SaleId) -> Result<Option<Sale>>;

    /// Creates a sale, replacing any existing sale with the same id.
    ///
    /// Administrative path; the admission pipeline treats sales as
    /// read-mostly.
    async fn create_sale(&self, sale: Sale) -> Result<()>;

    /// Counts `SUCCESS` orders for a sale.
    async fn count_success(&self, sale: &SaleId) -> Result<u64>;

    /// Counts orders for a sale broken down by status.
    async fn count_orders(&self, sale: &SaleId) -> Result<OrderCounts>;

    /// Lists the user ids of all `SUCCESS` orders for a sale.
    ///
    /// Used by user-mark recovery after a coordinator failover.
    async fn list_success_users(&self, sale: &SaleId) -> Result<Vec<UserId>>;

    /// Finds the `SUCCESS` order for `(sale, user)`, if one was committed.
    async fn find_success_order(&self, sale: &SaleId, user: &UserId) -> Result<Option<Order>>;

    /// Inserts an order row, assigning its id and commit timestamp.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DuplicateOrder`] when a row for the pair already
    /// exists, [`Error::Durable`] on transient connectivity problems, and
    /// [`Error::DurableFatal`] otherwise.
    async fn insert_order(
        &self,
        sale: &SaleId,
        user: &UserId,
        status: OrderStatus,
    ) -> Result<Order>;

    /// Deletes all orders for a sale, returning the number removed.
    ///
    /// Administrative path; used by reset only.
    async fn delete_orders(&self, sale: &SaleId) -> Result<u64>;

    /// Overwrites a sale's total stock.
    async fn set_total_stock(&self, sale: &SaleId, total_stock: u32) -> Result<()>;

    /// Updates a sale's window, leaving `None` fields unchanged.
    async fn update_window(
        &self,
        sale: &SaleId,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Sale>;

    /// Probes connectivity to the backing store.
    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct OrderLogState {
    sales: HashMap<String, Sale>,
    /// sale id -> user id -> committed row.
    orders: HashMap<String, HashMap<String, Order>>,
    next_order_id: i64,
}

/// In-memory order log for tests and debug deployments.
///
/// Enforces the same uniqueness constraint as the relational schema.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderLog {
    state: Arc<RwLock<OrderLogState>>,
}

impl MemoryOrderLog {
    /// Creates a new empty order log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, OrderLogState>> {
        self.state.read().map_err(|_| Error::Internal {
            message: "order log lock poisoned".into(),
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, OrderLogState>> {
        self.state.write().map_err(|_| Error::Internal {
            message: "order log lock poisoned".into(),
        })
    }
}

#[async_trait]
impl OrderLog for MemoryOrderLog {
    async fn get_sale(&self, sale: &SaleId) -> Result<Option<Sale>> {
        let state = self.read()?;
        Ok(state.sales.get(sale.as_str()).cloned())
    }

    async fn create_sale(&self, sale: Sale) -> Result<()> {
        let mut state = self.write()?;
        state.sales.insert(sale.id.as_str().to_string(), sale);
        Ok(())
    }

    async fn count_success(&self, sale: &SaleId) -> Result<u64> {
        Ok(self.count_orders(sale).await?.success)
    }

    async fn count_orders(&self, sale: &SaleId) -> Result<OrderCounts> {
        let state = self.read()?;
        let mut counts = OrderCounts::default();
        if let Some(orders) = state.orders.get(sale.as_str()) {
            for order in orders.values() {
                match order.status {
                    OrderStatus::Success => counts.success += 1,
                    OrderStatus::Failed => counts.failed += 1,
                }
            }
        }
        Ok(counts)
    }

    async fn list_success_users(&self, sale: &SaleId) -> Result<Vec<UserId>> {
        let state = self.read()?;
        Ok(state
            .orders
            .get(sale.as_str())
            .map(|orders| {
                orders
                    .values()
                    .filter(|o| o.status == OrderStatus::Success)
                    .map(|o| o.user_id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_success_order(&self, sale: &SaleId, user: &UserId) -> Result<Option<Order>> {
        let state = self.read()?;
        Ok(state
            .orders
            .get(sale.as_str())
            .and_then(|orders| orders.get(user.as_str()))
            .filter(|o| o.status == OrderStatus::Success)
            .cloned())
    }

    async fn insert_order(
        &self,
        sale: &SaleId,
        user: &UserId,
        status: OrderStatus,
    ) -> Result<Order> {
        let mut state = self.write()?;
        if !state.sales.contains_key(sale.as_str()) {
            return Err(Error::SaleNotFound {
                sale_id: sale.clone(),
            });
        }
        let orders = state
            .orders
            .entry(sale.as_str().to_string())
            .or_default();
        if orders.contains_key(user.as_str()) {
            return Err(Error::DuplicateOrder {
                sale_id: sale.clone(),
                user_id: user.clone(),
            });
        }
        state.next_order_id += 1;
        let order = Order {
            id: OrderId::new(state.next_order_id),
            sale_id: sale.clone(),
            user_id: user.clone(),
            status,
            created_at: Utc::now(),
        };
        if let Some(orders) = state.orders.get_mut(sale.as_str()) {
            orders.insert(user.as_str().to_string(), order.clone());
        }
        Ok(order)
    }

    async fn delete_orders(&self, sale: &SaleId) -> Result<u64> {
        let mut state = self.write()?;
        Ok(state
            .orders
            .remove(sale.as_str())
            .map(|orders| orders.len() as u64)
            .unwrap_or(0))
    }

    async fn set_total_stock(&self, sale: &SaleId, total_stock: u32) -> Result<()> {
        let mut state = self.write()?;
        let entry = state
            .sales
            .get_mut(sale.as_str())
            .ok_or_else(|| Error::SaleNotFound {
                sale_id: sale.clone(),
            })?;
        entry.total_stock = total_stock;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn update_window(
        &self,
        sale: &SaleId,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Sale> {
        let mut state = self.write()?;
        let entry = state
            .sales
            .get_mut(sale.as_str())
            .ok_or_else(|| Error::SaleNotFound {
                sale_id: sale.clone(),
            })?;
        if let Some(start) = start_time {
            entry.start_time = start;
        }
        if let Some(end) = end_time {
            entry.end_time = end;
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn ping(&self) -> Result<()> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seed_sale(log: &MemoryOrderLog, id: &str, stock: u32) -> SaleId {
        let sale_id = SaleId::new(id).unwrap();
        let now = Utc::now();
        let sale = Sale {
            id: sale_id.clone(),
            name: id.to_string(),
            start_time: now - Duration::minutes(5),
            end_time: now + Duration::minutes(5),
            total_stock: stock,
            created_at: now,
            updated_at: now,
        };
        log.create_sale(sale).await.unwrap();
        sale_id
    }

    #[tokio::test]
    async fn insert_assigns_monotonic_ids() {
        let log = MemoryOrderLog::new();
        let sale = seed_sale(&log, "flash", 10).await;
        let a = log
            .insert_order(&sale, &UserId::new("a").unwrap(), OrderStatus::Success)
            .await
            .unwrap();
        let b = log
            .insert_order(&sale, &UserId::new("b").unwrap(), OrderStatus::Success)
            .await
            .unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let log = MemoryOrderLog::new();
        let sale = seed_sale(&log, "flash", 10).await;
        let user = UserId::new("a").unwrap();
        log.insert_order(&sale, &user, OrderStatus::Success)
            .await
            .unwrap();
        let err = log
            .insert_order(&sale, &user, OrderStatus::Success)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateOrder { .. }));
    }

    #[tokio::test]
    async fn insert_requires_existing_sale() {
        let log = MemoryOrderLog::new();
        let err = log
            .insert_order(
                &SaleId::new("missing").unwrap(),
                &UserId::new("a").unwrap(),
                OrderStatus::Success,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SaleNotFound { .. }));
    }

    #[tokio::test]
    async fn counts_split_by_status() {
        let log = MemoryOrderLog::new();
        let sale = seed_sale(&log, "flash", 10).await;
        log.insert_order(&sale, &UserId::new("a").unwrap(), OrderStatus::Success)
            .await
            .unwrap();
        log.insert_order(&sale, &UserId::new("b").unwrap(), OrderStatus::Failed)
            .await
            .unwrap();
        let counts = log.count_orders(&sale).await.unwrap();
        assert_eq!(counts.success, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 2);
        assert_eq!(log.count_success(&sale).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn success_users_exclude_failed_rows() {
        let log = MemoryOrderLog::new();
        let sale = seed_sale(&log, "flash", 10).await;
        log.insert_order(&sale, &UserId::new("won").unwrap(), OrderStatus::Success)
            .await
            .unwrap();
        log.insert_order(&sale, &UserId::new("lost").unwrap(), OrderStatus::Failed)
            .await
            .unwrap();
        let users = log.list_success_users(&sale).await.unwrap();
        assert_eq!(users, vec![UserId::new("won").unwrap()]);
        assert!(log
            .find_success_order(&sale, &UserId::new("lost").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_orders_reports_removed_rows() {
        let log = MemoryOrderLog::new();
        let sale = seed_sale(&log, "flash", 10).await;
        log.insert_order(&sale, &UserId::new("a").unwrap(), OrderStatus::Success)
            .await
            .unwrap();
        assert_eq!(log.delete_orders(&sale).await.unwrap(), 1);
        assert_eq!(log.delete_orders(&sale).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn window_update_preserves_unset_fields() {
        let log = MemoryOrderLog::new();
        let sale = seed_sale(&log, "flash", 10).await;
        let before = log.get_sale(&sale).await.unwrap().unwrap();
        let new_end = before.end_time + Duration::hours(1);
        let updated = log.update_window(&sale, None, Some(new_end)).await.unwrap();
        assert_eq!(updated.start_time, before.start_time);
        assert_eq!(updated.end_time, new_end);
    }
}
