//! API server implementation.
//!
//! Provides health, ready, and API endpoints for the Surge purchase engine.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use surge_core::coordinator::{FastCoordinator, MemoryCoordinator};
use surge_core::orderlog::{MemoryOrderLog, OrderLog};
use surge_core::{Error, Result, SaleId};
use surge_engine::{Admission, Reconciler, StatusReader};

use crate::config::{Config, CorsConfig};
use crate::error::ApiError;
use crate::metrics;
use crate::openapi;
use crate::rate_limit::RateLimitState;
use crate::routes;

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    coordinator: Arc<dyn FastCoordinator>,
    orders: Arc<dyn OrderLog>,
    admission: Admission,
    reconciler: Reconciler,
    status: StatusReader,
    rate_limit: Arc<RateLimitState>,
    default_sale: SaleId,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("coordinator", &"<FastCoordinator>")
            .field("orders", &"<OrderLog>")
            .field("default_sale", &self.default_sale)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates application state over the given stores.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured default sale id is not a valid
    /// identifier.
    pub fn new(
        config: Config,
        coordinator: Arc<dyn FastCoordinator>,
        orders: Arc<dyn OrderLog>,
    ) -> Result<Self> {
        let default_sale = SaleId::new(config.default_sale_id.as_str()).map_err(|e| {
            Error::Validation {
                message: format!("SURGE_DEFAULT_SALE_ID is invalid: {e}"),
            }
        })?;
        let mark_ttl = config.mark_ttl();
        let admission = Admission::new(coordinator.clone(), orders.clone(), mark_ttl);
        let reconciler = Reconciler::new(coordinator.clone(), orders.clone(), mark_ttl);
        let status = StatusReader::new(coordinator.clone(), orders.clone());
        let rate_limit = Arc::new(RateLimitState::new(config.rate_limit.clone()));
        Ok(Self {
            config,
            coordinator,
            orders,
            admission,
            reconciler,
            status,
            rate_limit,
            default_sale,
        })
    }

    /// Returns the admission pipeline.
    #[must_use]
    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    /// Returns the reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Returns the status reader.
    #[must_use]
    pub fn status(&self) -> &StatusReader {
        &self.status
    }

    /// Returns the order log.
    #[must_use]
    pub fn orders(&self) -> &Arc<dyn OrderLog> {
        &self.orders
    }

    /// Returns the coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<dyn FastCoordinator> {
        &self.coordinator
    }

    /// Returns the rate limiter.
    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitState {
        &self.rate_limit
    }

    /// Resolves an optional sale id, falling back to the default sale.
    ///
    /// # Errors
    ///
    /// Returns a 400 [`ApiError`] when the provided id is invalid.
    pub fn resolve_sale(&self, sale_id: Option<&str>) -> std::result::Result<SaleId, ApiError> {
        match sale_id {
            Some(raw) => SaleId::new(raw).map_err(|e| ApiError::bad_request(e.to_string())),
            None => Ok(self.default_sale.clone()),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check
/// that doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Returns 200 OK when both the coordinator and the order log answer a probe.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.coordinator().ping().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("coordinator check failed: {e}")),
            }),
        );
    }
    if let Err(e) = state.orders().ping().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("order log check failed: {e}")),
            }),
        );
    }
    (
        StatusCode::OK,
        Json(ReadyResponse {
            ready: true,
            message: None,
        }),
    )
}

/// Middleware that stamps every response with an `x-request-id`.
async fn request_id_middleware(req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if config.allowed_origins.is_empty() {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(config.max_age_seconds));

    let layer = if config.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    };

    Some(layer)
}

// ============================================================================
// Server
// ============================================================================

/// The Surge API server.
pub struct Server {
    config: Config,
    coordinator: Arc<dyn FastCoordinator>,
    orders: Arc<dyn OrderLog>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("coordinator", &"<FastCoordinator>")
            .field("orders", &"<OrderLog>")
            .finish()
    }
}

impl Server {
    /// Creates a new server with in-memory stores.
    ///
    /// Use [`Self::with_stores`] for production.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            coordinator: Arc::new(MemoryCoordinator::new()),
            orders: Arc::new(MemoryOrderLog::new()),
        }
    }

    /// Creates a new server over explicit stores.
    #[must_use]
    pub fn with_stores(
        config: Config,
        coordinator: Arc<dyn FastCoordinator>,
        orders: Arc<dyn OrderLog>,
    ) -> Self {
        Self {
            config,
            coordinator,
            orders,
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the router with all routes and middleware.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid.
    pub fn router(&self) -> Result<Router> {
        let state = Arc::new(AppState::new(
            self.config.clone(),
            self.coordinator.clone(),
            self.orders.clone(),
        )?);

        let mut router = Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/metrics", get(metrics::serve_metrics))
            .route("/openapi.json", get(openapi::serve_openapi))
            .nest("/api/v1", routes::api_v1_routes())
            .layer(middleware::from_fn(metrics::metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http());

        if let Some(cors) = cors_layer(&self.config.cors) {
            router = router.layer(cors);
        }

        Ok(router.with_state(state))
    }

    /// Binds the configured port and serves until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error when the port cannot be bound or the configuration is
    /// invalid.
    pub async fn serve(self) -> Result<()> {
        let router = self.router()?;
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal {
                message: format!("failed to bind {addr}: {e}"),
            })?;
        tracing::info!(addr = %addr, "Surge API listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal {
                message: format!("server error: {e}"),
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
