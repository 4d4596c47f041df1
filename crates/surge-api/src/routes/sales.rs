//! Sale status and statistics routes.
//!
//! ## Routes
//!
//! - `GET /sale` - Current sale status
//! - `GET /sale/stats` - Sale status plus purchase counts

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use surge_engine::SaleStatusView;

use crate::error::{ApiError, ApiErrorBody};
use crate::routes::purchase::SaleQuery;
use crate::server::AppState;

/// Point-in-time sale status.
#[derive(Debug, Serialize, ToSchema)]
pub struct SaleStatusResponse {
    /// Sale identifier.
    pub sale_id: String,
    /// Sale name.
    pub name: String,
    /// `UPCOMING`, `ACTIVE`, or `ENDED`.
    pub status: String,
    /// Remaining units.
    pub remaining_stock: i64,
    /// Configured stock.
    pub total_stock: u32,
    /// Window start.
    pub start_time: DateTime<Utc>,
    /// Window end.
    pub end_time: DateTime<Utc>,
}

impl From<SaleStatusView> for SaleStatusResponse {
    fn from(view: SaleStatusView) -> Self {
        Self {
            sale_id: view.sale_id.to_string(),
            name: view.name,
            status: view.status.as_str().to_string(),
            remaining_stock: view.remaining_stock,
            total_stock: view.total_stock,
            start_time: view.start_time,
            end_time: view.end_time,
        }
    }
}

/// Purchase counts for a sale.
#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseCountsBody {
    /// Committed purchases.
    pub success_count: u64,
    /// Recorded failures.
    pub failed_count: u64,
    /// All rows.
    pub total_count: u64,
}

/// Sale status plus purchase counts.
#[derive(Debug, Serialize, ToSchema)]
pub struct SaleStatsResponse {
    /// Current sale status.
    pub sale: SaleStatusResponse,
    /// Order counts.
    pub purchases: PurchaseCountsBody,
}

/// Creates sale routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sale", get(get_sale_status))
        .route("/sale/stats", get(get_sale_stats))
}

/// Current status of a sale.
///
/// GET /api/v1/sale
#[utoipa::path(
    get,
    path = "/api/v1/sale",
    tag = "sale",
    params(
        ("sale_id" = Option<String>, Query, description = "Sale identifier (default sale when omitted)"),
    ),
    responses(
        (status = 200, description = "Sale status", body = SaleStatusResponse),
        (status = 404, description = "Sale not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn get_sale_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SaleQuery>,
) -> Result<Json<SaleStatusResponse>, ApiError> {
    let sale = state.resolve_sale(query.sale_id.as_deref())?;
    let status = state
        .status()
        .sale_status(&sale)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("sale not found: {sale}")))?;
    Ok(Json(status.into()))
}

/// Sale status plus purchase counts.
///
/// GET /api/v1/sale/stats
#[utoipa::path(
    get,
    path = "/api/v1/sale/stats",
    tag = "sale",
    params(
        ("sale_id" = Option<String>, Query, description = "Sale identifier (default sale when omitted)"),
    ),
    responses(
        (status = 200, description = "Sale statistics", body = SaleStatsResponse),
        (status = 404, description = "Sale not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn get_sale_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SaleQuery>,
) -> Result<Json<SaleStatsResponse>, ApiError> {
    let sale = state.resolve_sale(query.sale_id.as_deref())?;
    let stats = state
        .status()
        .stats(&sale)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("sale not found: {sale}")))?;
    Ok(Json(SaleStatsResponse {
        sale: stats.sale.into(),
        purchases: PurchaseCountsBody {
            success_count: stats.purchases.success_count,
            failed_count: stats.purchases.failed_count,
            total_count: stats.purchases.total_count,
        },
    }))
}
