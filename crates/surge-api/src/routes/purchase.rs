//! Purchase API routes.
//!
//! ## Routes
//!
//! - `POST /purchase` - Attempt to buy one unit in a sale
//! - `GET  /purchases/{user_id}` - Look up a buyer's committed order

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use surge_core::{Order, SalePhase, UserId};
use surge_engine::PurchaseDecision;

use crate::error::{ApiError, ApiErrorBody};
use crate::metrics::record_rate_limit_hit;
use crate::rate_limit::RateLimitResult;
use crate::server::AppState;

/// Request to purchase one unit.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PurchaseRequest {
    /// Buyer identifier (non-empty, at most 255 chars, `[A-Za-z0-9_-]`).
    pub user_id: String,
    /// Sale to buy from; the configured default sale when omitted.
    #[serde(default)]
    pub sale_id: Option<String>,
}

/// Purchase outcome code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseResult {
    /// A unit was consumed and the order committed.
    Success,
    /// The buyer already holds a unit in this sale.
    AlreadyPurchased,
    /// No stock remained.
    SoldOut,
    /// The sale window does not contain the current instant.
    SaleNotActive,
    /// No sale exists with the requested id.
    SaleNotFound,
    /// The attempt failed on infrastructure; safe to retry.
    Error,
}

impl PurchaseResult {
    /// HTTP status this outcome maps to.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            Self::AlreadyPurchased => StatusCode::CONFLICT,
            Self::SoldOut => StatusCode::GONE,
            Self::SaleNotActive => StatusCode::FORBIDDEN,
            Self::SaleNotFound => StatusCode::NOT_FOUND,
            Self::Error => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Committed order, as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderBody {
    /// Order id assigned on commit.
    pub order_id: i64,
    /// Sale the order belongs to.
    pub sale_id: String,
    /// Buyer that placed the order.
    pub user_id: String,
    /// Recorded status.
    pub status: String,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderBody {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id.as_i64(),
            sale_id: order.sale_id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status.to_string(),
            created_at: order.created_at,
        }
    }
}

/// Purchase response. Always carries `result` and `message`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseResponse {
    /// Outcome code.
    pub result: PurchaseResult,
    /// Human-readable outcome description.
    pub message: String,
    /// The committed order (`SUCCESS` only, or a fallback lookup).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderBody>,
    /// Units left after this purchase (`SUCCESS` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_stock: Option<i64>,
    /// Sale phase (`SALE_NOT_ACTIVE` only): `UPCOMING` or `ENDED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_status: Option<String>,
}

impl PurchaseResponse {
    fn outcome(result: PurchaseResult, message: impl Into<String>) -> Self {
        Self {
            result,
            message: message.into(),
            order: None,
            remaining_stock: None,
            sale_status: None,
        }
    }
}

/// Whether a buyer holds a unit in a sale.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserPurchaseResponse {
    /// True when a committed order exists.
    pub purchased: bool,
    /// The committed order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderBody>,
}

/// Query selecting a sale; the default sale when omitted.
#[derive(Debug, Deserialize)]
pub struct SaleQuery {
    /// Sale identifier.
    #[serde(default)]
    pub sale_id: Option<String>,
}

/// Creates purchase routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/purchase", post(purchase))
        .route("/purchases/:user_id", get(get_user_purchase))
}

/// Attempt to purchase one unit.
///
/// POST /api/v1/purchase
#[utoipa::path(
    post,
    path = "/api/v1/purchase",
    tag = "purchase",
    request_body = PurchaseRequest,
    responses(
        (status = 200, description = "Purchase accepted", body = PurchaseResponse),
        (status = 400, description = "Invalid user or sale id", body = ApiErrorBody),
        (status = 403, description = "Sale not active", body = PurchaseResponse),
        (status = 404, description = "Sale not found", body = PurchaseResponse),
        (status = 409, description = "Already purchased", body = PurchaseResponse),
        (status = 410, description = "Sold out", body = PurchaseResponse),
        (status = 429, description = "Rate limited", body = ApiErrorBody),
        (status = 500, description = "Infrastructure failure", body = PurchaseResponse),
    )
)]
pub(crate) async fn purchase(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Response, ApiError> {
    let user = UserId::new(req.user_id.as_str())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    if let RateLimitResult::Limited { retry_after_secs } =
        state.rate_limit().check(user.as_str()).await
    {
        record_rate_limit_hit("/api/v1/purchase");
        return Err(ApiError::too_many_requests(retry_after_secs));
    }

    let sale = state.resolve_sale(req.sale_id.as_deref())?;

    tracing::debug!(sale = %sale, user = %user, "Purchase attempt");

    let response = match state.admission().purchase(&sale, &user).await {
        Ok(decision) => decision_response(decision),
        Err(err) => {
            tracing::error!(sale = %sale, user = %user, error = %err, "Purchase failed");
            PurchaseResponse::outcome(PurchaseResult::Error, "Purchase failed, please retry")
        }
    };

    Ok((response.result.status_code(), Json(response)).into_response())
}

fn decision_response(decision: PurchaseDecision) -> PurchaseResponse {
    match decision {
        PurchaseDecision::Success {
            order,
            remaining_stock,
        } => PurchaseResponse {
            order: Some(order.into()),
            remaining_stock: Some(remaining_stock),
            ..PurchaseResponse::outcome(PurchaseResult::Success, "Purchase successful")
        },
        PurchaseDecision::AlreadyPurchased { order } => PurchaseResponse {
            order: order.map(Into::into),
            ..PurchaseResponse::outcome(
                PurchaseResult::AlreadyPurchased,
                "Already purchased in this sale",
            )
        },
        PurchaseDecision::SoldOut => {
            PurchaseResponse::outcome(PurchaseResult::SoldOut, "Sold out")
        }
        PurchaseDecision::NotActive { phase } => PurchaseResponse {
            sale_status: Some(phase.as_str().to_string()),
            ..PurchaseResponse::outcome(
                PurchaseResult::SaleNotActive,
                match phase {
                    SalePhase::Upcoming => "Sale has not started yet",
                    SalePhase::Ended => "Sale has ended",
                    // The pipeline only rejects with Upcoming or Ended.
                    SalePhase::Active => unreachable!("active sale reported as not active"),
                },
            )
        },
        PurchaseDecision::NotFound => {
            PurchaseResponse::outcome(PurchaseResult::SaleNotFound, "Sale not found")
        }
    }
}

/// Look up a buyer's committed order.
///
/// GET /api/v1/purchases/{user_id}
#[utoipa::path(
    get,
    path = "/api/v1/purchases/{user_id}",
    tag = "purchase",
    params(
        ("user_id" = String, Path, description = "Buyer identifier"),
        ("sale_id" = Option<String>, Query, description = "Sale identifier (default sale when omitted)"),
    ),
    responses(
        (status = 200, description = "Lookup result", body = UserPurchaseResponse),
        (status = 400, description = "Invalid user or sale id", body = ApiErrorBody),
    )
)]
pub(crate) async fn get_user_purchase(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<SaleQuery>,
) -> Result<Json<UserPurchaseResponse>, ApiError> {
    let user =
        UserId::new(user_id.as_str()).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let sale = state.resolve_sale(query.sale_id.as_deref())?;

    let lookup = state.status().user_purchase(&sale, &user).await?;
    Ok(Json(UserPurchaseResponse {
        purchased: lookup.purchased,
        order: lookup.order.map(Into::into),
    }))
}
