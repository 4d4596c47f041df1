//! Pre-built test fixtures for common test scenarios.
//!
//! Provides factory functions to create test sales and users with sensible
//! defaults.

use std::sync::Arc;

use chrono::{Duration, Utc};

use surge_core::coordinator::{FastCoordinator, MemoryCoordinator};
use surge_core::id::{SaleId, UserId};
use surge_core::orderlog::{MemoryOrderLog, OrderLog};
use surge_core::sale::Sale;

/// Builds a sale whose window contains the current instant.
pub fn active_sale(id: &str, total_stock: u32) -> Sale {
    sale_with_window(id, total_stock, -60, 60)
}

/// Builds a sale whose window is entirely in the future.
pub fn upcoming_sale(id: &str, total_stock: u32) -> Sale {
    sale_with_window(id, total_stock, 60, 120)
}

/// Builds a sale whose window is entirely in the past.
pub fn ended_sale(id: &str, total_stock: u32) -> Sale {
    sale_with_window(id, total_stock, -120, -60)
}

/// Builds a sale with start/end offsets in minutes from now.
pub fn sale_with_window(
    id: &str,
    total_stock: u32,
    start_offset_mins: i64,
    end_offset_mins: i64,
) -> Sale {
    let now = Utc::now();
    Sale {
        id: SaleId::new(id).expect("valid sale id"),
        name: format!("{id} sale"),
        start_time: now + Duration::minutes(start_offset_mins),
        end_time: now + Duration::minutes(end_offset_mins),
        total_stock,
        created_at: now,
        updated_at: now,
    }
}

/// Returns a deterministic user id for index `n`.
pub fn user(n: usize) -> UserId {
    UserId::new(format!("user-{n}")).expect("valid user id")
}

/// In-memory coordinator and order log pair wired for engine tests.
#[derive(Clone, Default)]
pub struct TestStores {
    /// Shared coordinator.
    pub coordinator: Arc<MemoryCoordinator>,
    /// Shared order log.
    pub orders: Arc<MemoryOrderLog>,
}

impl TestStores {
    /// Creates an empty store pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an active sale and bootstraps the coordinator counter.
    pub async fn seed_active_sale(&self, id: &str, total_stock: u32) -> SaleId {
        let sale = active_sale(id, total_stock);
        let sale_id = sale.id.clone();
        self.orders.create_sale(sale).await.expect("create sale");
        self.coordinator
            .set_stock(&sale_id, i64::from(total_stock))
            .await
            .expect("set stock");
        sale_id
    }

    /// Seeds a sale without touching the coordinator.
    pub async fn seed_sale(&self, sale: Sale) -> SaleId {
        let sale_id = sale.id.clone();
        self.orders.create_sale(sale).await.expect("create sale");
        sale_id
    }
}
