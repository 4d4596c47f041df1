//! OpenAPI document for the Surge API.

use axum::Json;
use utoipa::OpenApi;

use crate::error::ApiErrorBody;
use crate::routes::{admin, purchase, sales};

/// Aggregated OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Surge API",
        description = "Flash-sale purchase engine",
    ),
    paths(
        purchase::purchase,
        purchase::get_user_purchase,
        sales::get_sale_status,
        sales::get_sale_stats,
        admin::reset_sale,
        admin::update_window,
        admin::init_stock,
        admin::recover_marks,
    ),
    components(schemas(
        ApiErrorBody,
        purchase::PurchaseRequest,
        purchase::PurchaseResult,
        purchase::PurchaseResponse,
        purchase::OrderBody,
        purchase::UserPurchaseResponse,
        sales::SaleStatusResponse,
        sales::PurchaseCountsBody,
        sales::SaleStatsResponse,
        admin::ResetRequest,
        admin::UpdateWindowRequest,
        admin::SaleSelector,
        admin::OkResponse,
        admin::SaleBody,
        admin::UpdateWindowResponse,
        admin::InitStockResponse,
        admin::RecoverMarksResponse,
    )),
    tags(
        (name = "purchase", description = "Buyer-facing purchase operations"),
        (name = "sale", description = "Sale status and statistics"),
        (name = "admin", description = "Administrative and recovery operations"),
    )
)]
pub struct ApiDoc;

/// Handler for `/openapi.json`.
pub async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
