//! `surge-api` binary entrypoint.
//!
//! Loads configuration from environment variables, wires the stores, seeds
//! the stock counter for the default sale, and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use surge_api::config::Config;
use surge_api::metrics::init_metrics;
use surge_api::server::Server;
use surge_core::coordinator::{FastCoordinator, MemoryCoordinator};
use surge_core::observability::{init_logging, LogFormat};
use surge_core::orderlog::{MemoryOrderLog, OrderLog};
use surge_core::SaleId;
use surge_engine::Reconciler;
use surge_postgres::PostgresOrderLog;

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(choose_log_format(&config));
    init_metrics();

    let orders: Arc<dyn OrderLog> = if let Some(url) = config.database_url.as_deref() {
        let log = PostgresOrderLog::connect(url, config.db_max_connections).await?;
        log.ensure_schema().await?;
        tracing::info!(
            max_connections = config.db_max_connections,
            "Using PostgreSQL order log"
        );
        Arc::new(log)
    } else {
        if !config.debug {
            anyhow::bail!("SURGE_DATABASE_URL is required when SURGE_DEBUG=false");
        }
        tracing::warn!("SURGE_DATABASE_URL not set; using in-memory order log (debug only)");
        Arc::new(MemoryOrderLog::new())
    };

    // The coordinator is process-local: one atomic counter shared by every
    // worker task in this process. A multi-node deployment needs an external
    // coordinator behind the same trait.
    let coordinator: Arc<dyn FastCoordinator> = Arc::new(MemoryCoordinator::new());

    let default_sale = SaleId::new(config.default_sale_id.as_str())?;
    let reconciler = Reconciler::new(coordinator.clone(), orders.clone(), config.mark_ttl());
    reconciler.bootstrap(&default_sale).await?;

    let server = Server::with_stores(config, coordinator, orders);
    server.serve().await?;
    Ok(())
}
