//! Administrative routes: reset, window updates, and recovery procedures.
//!
//! These endpoints exist for tests, controlled relaunches, and operator
//! intervention after a coordinator failover. They are not part of the buyer
//! surface and assume a trusted caller (deploy them behind the internal
//! ingress).
//!
//! ## Routes
//!
//! - `POST /admin/reset` - Reset a sale to a fresh stock level
//! - `POST /admin/window` - Update a sale's window
//! - `POST /admin/stock/init` - Recompute the stock counter from the order log
//! - `POST /admin/marks/recover` - Rebuild user marks from the order log

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use surge_core::Sale;

use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Request to reset a sale.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetRequest {
    /// Sale to reset; the default sale when omitted.
    #[serde(default)]
    pub sale_id: Option<String>,
    /// New total stock.
    pub stock: u32,
}

/// Request to update a sale window.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateWindowRequest {
    /// Sale to update.
    pub sale_id: String,
    /// New window start; unchanged when omitted.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// New window end; unchanged when omitted.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Request selecting a sale for a recovery procedure.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SaleSelector {
    /// Sale identifier; the default sale when omitted.
    #[serde(default)]
    pub sale_id: Option<String>,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct OkResponse {
    /// Always true on success.
    pub ok: bool,
}

/// Sale metadata, as returned from administrative updates.
#[derive(Debug, Serialize, ToSchema)]
pub struct SaleBody {
    /// Sale identifier.
    pub sale_id: String,
    /// Sale name.
    pub name: String,
    /// Window start.
    pub start_time: DateTime<Utc>,
    /// Window end.
    pub end_time: DateTime<Utc>,
    /// Configured stock.
    pub total_stock: u32,
}

impl From<Sale> for SaleBody {
    fn from(sale: Sale) -> Self {
        Self {
            sale_id: sale.id.to_string(),
            name: sale.name,
            start_time: sale.start_time,
            end_time: sale.end_time,
            total_stock: sale.total_stock,
        }
    }
}

/// Window update acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateWindowResponse {
    /// Always true on success.
    pub ok: bool,
    /// The sale after the update.
    pub sale: SaleBody,
}

/// Stock reinitialisation acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct InitStockResponse {
    /// Always true on success.
    pub ok: bool,
    /// The counter value written to the coordinator.
    pub initialized_stock: i64,
}

/// Mark recovery acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecoverMarksResponse {
    /// Always true on success.
    pub ok: bool,
    /// Number of marks rebuilt.
    pub restored: usize,
}

/// Creates admin routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/reset", post(reset_sale))
        .route("/admin/window", post(update_window))
        .route("/admin/stock/init", post(init_stock))
        .route("/admin/marks/recover", post(recover_marks))
}

/// Reset a sale: new total stock, no orders, clean coordinator state.
///
/// POST /api/v1/admin/reset
#[utoipa::path(
    post,
    path = "/api/v1/admin/reset",
    tag = "admin",
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Sale reset", body = OkResponse),
        (status = 404, description = "Sale not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn reset_sale(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let sale = state.resolve_sale(req.sale_id.as_deref())?;
    tracing::info!(sale = %sale, stock = req.stock, "Resetting sale");
    state.reconciler().reset(&sale, req.stock).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// Update a sale's window.
///
/// POST /api/v1/admin/window
#[utoipa::path(
    post,
    path = "/api/v1/admin/window",
    tag = "admin",
    request_body = UpdateWindowRequest,
    responses(
        (status = 200, description = "Window updated", body = UpdateWindowResponse),
        (status = 404, description = "Sale not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn update_window(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateWindowRequest>,
) -> Result<Json<UpdateWindowResponse>, ApiError> {
    let sale = state.resolve_sale(Some(req.sale_id.as_str()))?;
    tracing::info!(sale = %sale, "Updating sale window");
    let updated = state
        .orders()
        .update_window(&sale, req.start_time, req.end_time)
        .await?;
    Ok(Json(UpdateWindowResponse {
        ok: true,
        sale: updated.into(),
    }))
}

/// Recompute the stock counter from the order log.
///
/// Not safe under live purchase traffic; in-flight decrements are not
/// reflected in the recomputed value.
///
/// POST /api/v1/admin/stock/init
#[utoipa::path(
    post,
    path = "/api/v1/admin/stock/init",
    tag = "admin",
    request_body = SaleSelector,
    responses(
        (status = 200, description = "Stock counter reinitialised", body = InitStockResponse),
        (status = 404, description = "Sale not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn init_stock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaleSelector>,
) -> Result<Json<InitStockResponse>, ApiError> {
    let sale = state.resolve_sale(req.sale_id.as_deref())?;
    let initialized_stock = state.reconciler().init_stock(&sale).await?;
    Ok(Json(InitStockResponse {
        ok: true,
        initialized_stock,
    }))
}

/// Rebuild user marks from the order log.
///
/// POST /api/v1/admin/marks/recover
#[utoipa::path(
    post,
    path = "/api/v1/admin/marks/recover",
    tag = "admin",
    request_body = SaleSelector,
    responses(
        (status = 200, description = "Marks rebuilt", body = RecoverMarksResponse),
        (status = 404, description = "Sale not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn recover_marks(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaleSelector>,
) -> Result<Json<RecoverMarksResponse>, ApiError> {
    let sale = state.resolve_sale(req.sale_id.as_deref())?;
    let restored = state.reconciler().recover_user_marks(&sale).await?;
    Ok(Json(RecoverMarksResponse { ok: true, restored }))
}
