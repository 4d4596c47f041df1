//! # surge-api
//!
//! HTTP surface for the Surge flash-sale purchase engine.
//!
//! Exposes the purchase, status, and administrative recovery operations over
//! axum, with Prometheus metrics, structured request logging, and an OpenAPI
//! document. Transport concerns stop here; admission semantics live in
//! `surge-engine`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod rate_limit;
pub mod routes;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use server::{AppState, Server};
