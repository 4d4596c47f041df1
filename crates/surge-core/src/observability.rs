//! Observability infrastructure for Surge.
//!
//! Structured logging with consistent spans. This module provides the
//! initialization helper and span constructors shared by all components.

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `surge_engine=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for admission operations with standard fields.
#[must_use]
pub fn admission_span(operation: &str, sale: &str, user: &str) -> Span {
    tracing::info_span!(
        "admission",
        op = operation,
        sale = sale,
        user = user,
    )
}

/// Creates a span for reconciliation operations.
#[must_use]
pub fn reconcile_span(operation: &str, sale: &str) -> Span {
    tracing::info_span!(
        "reconcile",
        op = operation,
        sale = sale,
    )
}
