//! Crash-recovery laws exercised through the administrative API.
//!
//! After the coordinator loses all state, `stock/init` plus `marks/recover`
//! must restore exactly what the order log knows: remaining stock equals
//! `total − count(SUCCESS)` and every committed buyer is rejected on the
//! fast path again.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tower::ServiceExt;

use surge_api::config::Config;
use surge_api::server::Server;
use surge_core::coordinator::FastCoordinator;
use surge_test_utils::fixtures::TestStores;

const DEFAULT_SALE: &str = "default";

async fn router_with_stock(stock: u32) -> (axum::Router, TestStores) {
    let stores = TestStores::new();
    stores.seed_active_sale(DEFAULT_SALE, stock).await;
    let router = Server::with_stores(
        Config {
            debug: true,
            ..Config::default()
        },
        stores.coordinator.clone(),
        stores.orders.clone(),
    )
    .router()
    .expect("valid test config");
    (router, stores)
}

async fn call(
    router: axum::Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Result<(StatusCode, serde_json::Value)> {
    let body = match body {
        Some(v) => Body::from(serde_json::to_vec(&v).context("serialize request")?),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .context("build request")?;
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .context("read response body")?;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).context("parse response body")?
    };
    Ok((status, json))
}

async fn buy(router: axum::Router, user: &str) -> Result<StatusCode> {
    let (status, _) = call(
        router,
        Method::POST,
        "/api/v1/purchase",
        Some(serde_json::json!({"user_id": user})),
    )
    .await?;
    Ok(status)
}

#[tokio::test]
async fn coordinator_wipe_then_recovery_restores_the_log_view() -> Result<()> {
    let (router, stores) = router_with_stock(10).await;

    let winners: Vec<String> = (0..10).map(|n| format!("winner-{n}")).collect();
    for user in &winners {
        assert_eq!(buy(router.clone(), user).await?, StatusCode::OK);
    }
    assert_eq!(buy(router.clone(), "too-late").await?, StatusCode::GONE);

    // Lose every coordinator fact: counter and marks.
    let sale = surge_core::SaleId::new(DEFAULT_SALE).unwrap();
    stores.coordinator.reset(&sale).await.unwrap();

    let (status, body) = call(
        router.clone(),
        Method::POST,
        "/api/v1/admin/stock/init",
        Some(serde_json::json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["initialized_stock"], 0);

    let (status, body) = call(
        router.clone(),
        Method::POST,
        "/api/v1/admin/marks/recover",
        Some(serde_json::json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["restored"], 10);

    let (_, body) = call(router.clone(), Method::GET, "/api/v1/sale", None).await?;
    assert_eq!(body["remaining_stock"], 0);

    for user in &winners {
        let (_, body) = call(
            router.clone(),
            Method::GET,
            &format!("/api/v1/purchases/{user}"),
            None,
        )
        .await?;
        assert_eq!(body["purchased"], serde_json::json!(true));
        assert_eq!(buy(router.clone(), user).await?, StatusCode::CONFLICT);
    }
    Ok(())
}

#[tokio::test]
async fn repeated_recovery_is_idempotent() -> Result<()> {
    let (router, stores) = router_with_stock(5).await;
    for n in 0..2 {
        buy(router.clone(), &format!("buyer-{n}")).await?;
    }

    let sale = surge_core::SaleId::new(DEFAULT_SALE).unwrap();
    stores.coordinator.reset(&sale).await.unwrap();

    for _ in 0..2 {
        let (_, body) = call(
            router.clone(),
            Method::POST,
            "/api/v1/admin/stock/init",
            Some(serde_json::json!({})),
        )
        .await?;
        assert_eq!(body["initialized_stock"], 3);

        let (_, body) = call(
            router.clone(),
            Method::POST,
            "/api/v1/admin/marks/recover",
            Some(serde_json::json!({})),
        )
        .await?;
        assert_eq!(body["restored"], 2);
    }

    assert_eq!(stores.coordinator.get_stock(&sale).await.unwrap(), Some(3));
    Ok(())
}

#[tokio::test]
async fn reset_twice_yields_identical_status() -> Result<()> {
    let (router, _stores) = router_with_stock(10).await;
    buy(router.clone(), "buyer-1").await?;

    let mut snapshots = Vec::new();
    for _ in 0..2 {
        let (status, _) = call(
            router.clone(),
            Method::POST,
            "/api/v1/admin/reset",
            Some(serde_json::json!({"stock": 50})),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(router.clone(), Method::GET, "/api/v1/sale", None).await?;
        snapshots.push(body);
    }

    assert_eq!(snapshots[0]["remaining_stock"], 50);
    assert_eq!(snapshots[0]["remaining_stock"], snapshots[1]["remaining_stock"]);
    assert_eq!(snapshots[0]["total_stock"], snapshots[1]["total_stock"]);
    assert_eq!(snapshots[0]["status"], snapshots[1]["status"]);

    let (_, stats) = call(router, Method::GET, "/api/v1/sale/stats", None).await?;
    assert_eq!(stats["purchases"]["total_count"], 0);
    Ok(())
}
