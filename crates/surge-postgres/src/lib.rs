//! # surge-postgres
//!
//! PostgreSQL implementation of the Surge durable order log.
//!
//! The relational store is the source of truth for accepted purchases. The
//! `UNIQUE (user_id, sale_id)` constraint on the order table is the ultimate
//! enforcer of one-unit-per-buyer; the admission pipeline relies on the
//! constraint violation surfacing as [`Error::DuplicateOrder`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use surge_core::error::{Error, Result};
use surge_core::id::{OrderId, SaleId, UserId};
use surge_core::order::{Order, OrderStatus};
use surge_core::orderlog::{OrderCounts, OrderLog};
use surge_core::sale::Sale;

/// SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Logical schema for the order log.
///
/// Applied idempotently at startup; production deployments may instead manage
/// the schema through their own migration tooling.
const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS sale (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    start_time  TIMESTAMPTZ NOT NULL,
    end_time    TIMESTAMPTZ NOT NULL,
    total_stock BIGINT NOT NULL CHECK (total_stock >= 0),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS sale_order (
    id         BIGSERIAL PRIMARY KEY,
    user_id    VARCHAR(255) NOT NULL,
    sale_id    TEXT NOT NULL REFERENCES sale(id),
    status     TEXT NOT NULL CHECK (status IN ('SUCCESS', 'FAILED')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT sale_order_user_sale_unique UNIQUE (user_id, sale_id)
);

CREATE INDEX IF NOT EXISTS idx_sale_order_sale ON sale_order (sale_id);
";

/// Durable order log backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresOrderLog {
    pool: PgPool,
}

impl PostgresOrderLog {
    /// Connects with a bounded pool.
    ///
    /// # Errors
    ///
    /// Returns a transient [`Error::Durable`] when the database is
    /// unreachable and [`Error::DurableFatal`] on configuration problems.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| classify(e, "connect to order log"))?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the order-log schema idempotently.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, "apply order log schema"))?;
        tracing::info!("order log schema ensured");
        Ok(())
    }

    fn sale_from_row(row: &sqlx::postgres::PgRow) -> Result<Sale> {
        let id: String = row.try_get("id").map_err(|e| classify(e, "read sale.id"))?;
        let total_stock: i64 = row
            .try_get("total_stock")
            .map_err(|e| classify(e, "read sale.total_stock"))?;
        Ok(Sale {
            id: SaleId::new(id)?,
            name: row
                .try_get("name")
                .map_err(|e| classify(e, "read sale.name"))?,
            start_time: row
                .try_get("start_time")
                .map_err(|e| classify(e, "read sale.start_time"))?,
            end_time: row
                .try_get("end_time")
                .map_err(|e| classify(e, "read sale.end_time"))?,
            total_stock: u32::try_from(total_stock).map_err(|_| {
                Error::durable_fatal(format!("sale.total_stock out of range: {total_stock}"))
            })?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| classify(e, "read sale.created_at"))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| classify(e, "read sale.updated_at"))?,
        })
    }

    fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<Order> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| classify(e, "read order.id"))?;
        let sale_id: String = row
            .try_get("sale_id")
            .map_err(|e| classify(e, "read order.sale_id"))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| classify(e, "read order.user_id"))?;
        let status: String = row
            .try_get("status")
            .map_err(|e| classify(e, "read order.status"))?;
        Ok(Order {
            id: OrderId::new(id),
            sale_id: SaleId::new(sale_id)?,
            user_id: UserId::new(user_id)?,
            status: OrderStatus::parse(&status)?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| classify(e, "read order.created_at"))?,
        })
    }
}

/// Maps a sqlx error to the shared error taxonomy.
///
/// Connectivity-shaped failures are transient; everything else is fatal.
/// Constraint violations are classified at the call site where the ids are
/// known.
fn classify(err: sqlx::Error, context: &str) -> Error {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => Error::durable_with_source(context.to_string(), err),
        other => Error::durable_fatal(format!("{context}: {other}")),
    }
}

fn constraint_code(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.to_string())
}

#[async_trait]
impl OrderLog for PostgresOrderLog {
    async fn get_sale(&self, sale: &SaleId) -> Result<Option<Sale>> {
        let row = sqlx::query(
            "SELECT id, name, start_time, end_time, total_stock, created_at, updated_at \
             FROM sale WHERE id = $1",
        )
        .bind(sale.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, "read sale"))?;
        row.as_ref().map(Self::sale_from_row).transpose()
    }

    async fn create_sale(&self, sale: Sale) -> Result<()> {
        sqlx::query(
            "INSERT INTO sale (id, name, start_time, end_time, total_stock, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 start_time = EXCLUDED.start_time, \
                 end_time = EXCLUDED.end_time, \
                 total_stock = EXCLUDED.total_stock, \
                 updated_at = now()",
        )
        .bind(sale.id.as_str())
        .bind(&sale.name)
        .bind(sale.start_time)
        .bind(sale.end_time)
        .bind(i64::from(sale.total_stock))
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "create sale"))?;
        Ok(())
    }

    async fn count_success(&self, sale: &SaleId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sale_order WHERE sale_id = $1 AND status = 'SUCCESS'",
        )
        .bind(sale.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "count committed orders"))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn count_orders(&self, sale: &SaleId) -> Result<OrderCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM sale_order WHERE sale_id = $1 GROUP BY status",
        )
        .bind(sale.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(e, "count orders"))?;

        let mut counts = OrderCounts::default();
        for row in rows {
            let status: String = row
                .try_get("status")
                .map_err(|e| classify(e, "read order count status"))?;
            let count: i64 = row
                .try_get("count")
                .map_err(|e| classify(e, "read order count"))?;
            let count = u64::try_from(count).unwrap_or(0);
            match OrderStatus::parse(&status)? {
                OrderStatus::Success => counts.success = count,
                OrderStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }

    async fn list_success_users(&self, sale: &SaleId) -> Result<Vec<UserId>> {
        let users: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM sale_order WHERE sale_id = $1 AND status = 'SUCCESS'",
        )
        .bind(sale.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(e, "list committed buyers"))?;
        users.into_iter().map(UserId::new).collect()
    }

    async fn find_success_order(&self, sale: &SaleId, user: &UserId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, user_id, sale_id, status, created_at FROM sale_order \
             WHERE sale_id = $1 AND user_id = $2 AND status = 'SUCCESS'",
        )
        .bind(sale.as_str())
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, "find committed order"))?;
        row.as_ref().map(Self::order_from_row).transpose()
    }

    async fn insert_order(
        &self,
        sale: &SaleId,
        user: &UserId,
        status: OrderStatus,
    ) -> Result<Order> {
        let result = sqlx::query(
            "INSERT INTO sale_order (user_id, sale_id, status) VALUES ($1, $2, $3) \
             RETURNING id, user_id, sale_id, status, created_at",
        )
        .bind(user.as_str())
        .bind(sale.as_str())
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Self::order_from_row(&row),
            Err(err) => match constraint_code(&err).as_deref() {
                Some(UNIQUE_VIOLATION) => Err(Error::DuplicateOrder {
                    sale_id: sale.clone(),
                    user_id: user.clone(),
                }),
                Some(FOREIGN_KEY_VIOLATION) => Err(Error::SaleNotFound {
                    sale_id: sale.clone(),
                }),
                _ => Err(classify(err, "insert order")),
            },
        }
    }

    async fn delete_orders(&self, sale: &SaleId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sale_order WHERE sale_id = $1")
            .bind(sale.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, "delete orders"))?;
        Ok(result.rows_affected())
    }

    async fn set_total_stock(&self, sale: &SaleId, total_stock: u32) -> Result<()> {
        let result =
            sqlx::query("UPDATE sale SET total_stock = $2, updated_at = now() WHERE id = $1")
                .bind(sale.as_str())
                .bind(i64::from(total_stock))
                .execute(&self.pool)
                .await
                .map_err(|e| classify(e, "set total stock"))?;
        if result.rows_affected() == 0 {
            return Err(Error::SaleNotFound {
                sale_id: sale.clone(),
            });
        }
        Ok(())
    }

    async fn update_window(
        &self,
        sale: &SaleId,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Sale> {
        let row = sqlx::query(
            "UPDATE sale SET \
                 start_time = COALESCE($2, start_time), \
                 end_time = COALESCE($3, end_time), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING id, name, start_time, end_time, total_stock, created_at, updated_at",
        )
        .bind(sale.as_str())
        .bind(start_time)
        .bind(end_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, "update sale window"))?;
        row.as_ref()
            .map(Self::sale_from_row)
            .transpose()?
            .ok_or_else(|| Error::SaleNotFound {
                sale_id: sale.clone(),
            })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "ping order log"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_failures_are_transient() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(classify(io, "test").is_transient());
        assert!(classify(sqlx::Error::PoolTimedOut, "test").is_transient());
        assert!(classify(sqlx::Error::PoolClosed, "test").is_transient());
    }

    #[test]
    fn other_failures_are_fatal() {
        let err = classify(sqlx::Error::RowNotFound, "test");
        assert!(!err.is_transient());
        assert!(matches!(err, Error::DurableFatal { .. }));
    }

    #[test]
    fn schema_enforces_one_order_per_buyer() {
        assert!(SCHEMA_SQL.contains("UNIQUE (user_id, sale_id)"));
        assert!(SCHEMA_SQL.contains("CHECK (total_stock >= 0)"));
    }
}
