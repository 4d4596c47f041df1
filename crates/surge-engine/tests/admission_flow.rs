//! Sequential admission pipeline behavior.
//!
//! Covers the happy path, the boundary decrement, window gating, and the
//! duplicate-insert compensation that keeps the counter honest.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use surge_core::coordinator::FastCoordinator;
use surge_core::order::OrderStatus;
use surge_core::orderlog::OrderLog;
use surge_core::sale::SalePhase;
use surge_engine::{Admission, PurchaseDecision};
use surge_test_utils::fixtures::{self, TestStores};

const MARK_TTL: Duration = Duration::from_secs(3600);

fn admission(stores: &TestStores) -> Admission {
    Admission::new(stores.coordinator.clone(), stores.orders.clone(), MARK_TTL)
}

#[tokio::test]
async fn accepted_purchase_commits_and_decrements() {
    let stores = TestStores::new();
    let sale = stores.seed_active_sale("flash", 5).await;
    let user = fixtures::user(1);

    let decision = admission(&stores).purchase(&sale, &user).await.unwrap();

    let PurchaseDecision::Success {
        order,
        remaining_stock,
    } = decision
    else {
        panic!("expected success, got {decision:?}");
    };
    assert_eq!(remaining_stock, 4);
    assert_eq!(order.user_id, user);
    assert_eq!(order.status, OrderStatus::Success);
    assert_eq!(stores.coordinator.get_stock(&sale).await.unwrap(), Some(4));
    assert_eq!(stores.orders.count_success(&sale).await.unwrap(), 1);
    assert!(stores.coordinator.has_mark(&sale, &user).await.unwrap());
}

#[tokio::test]
async fn last_unit_sells_and_next_attempt_is_sold_out() {
    let stores = TestStores::new();
    let sale = stores.seed_active_sale("flash", 1).await;
    let pipeline = admission(&stores);

    let first = pipeline
        .purchase(&sale, &fixtures::user(1))
        .await
        .unwrap();
    assert!(matches!(
        first,
        PurchaseDecision::Success {
            remaining_stock: 0,
            ..
        }
    ));

    let second = pipeline
        .purchase(&sale, &fixtures::user(2))
        .await
        .unwrap();
    assert!(matches!(second, PurchaseDecision::SoldOut));

    // The compensating increment leaves the counter at rest at zero,
    // never negative.
    assert_eq!(stores.coordinator.get_stock(&sale).await.unwrap(), Some(0));
}

#[tokio::test]
async fn upcoming_sale_rejects_without_touching_the_counter() {
    let stores = TestStores::new();
    let sale = stores.seed_sale(fixtures::upcoming_sale("early", 10)).await;
    stores.coordinator.set_stock(&sale, 10).await.unwrap();

    let decision = admission(&stores)
        .purchase(&sale, &fixtures::user(1))
        .await
        .unwrap();

    assert!(matches!(
        decision,
        PurchaseDecision::NotActive {
            phase: SalePhase::Upcoming
        }
    ));
    assert_eq!(stores.coordinator.get_stock(&sale).await.unwrap(), Some(10));
    assert_eq!(stores.orders.count_success(&sale).await.unwrap(), 0);
}

#[tokio::test]
async fn ended_sale_reports_ended_phase() {
    let stores = TestStores::new();
    let sale = stores.seed_sale(fixtures::ended_sale("late", 10)).await;

    let decision = admission(&stores)
        .purchase(&sale, &fixtures::user(1))
        .await
        .unwrap();

    assert!(matches!(
        decision,
        PurchaseDecision::NotActive {
            phase: SalePhase::Ended
        }
    ));
}

#[tokio::test]
async fn unknown_sale_is_not_found() {
    let stores = TestStores::new();
    let sale = surge_core::SaleId::new("nope").unwrap();

    let decision = admission(&stores)
        .purchase(&sale, &fixtures::user(1))
        .await
        .unwrap();

    assert!(matches!(decision, PurchaseDecision::NotFound));
}

#[tokio::test]
async fn repeat_buyer_takes_the_fast_path() {
    let stores = TestStores::new();
    let sale = stores.seed_active_sale("flash", 5).await;
    let user = fixtures::user(1);
    let pipeline = admission(&stores);

    pipeline.purchase(&sale, &user).await.unwrap();
    let decision = pipeline.purchase(&sale, &user).await.unwrap();

    assert!(matches!(
        decision,
        PurchaseDecision::AlreadyPurchased { .. }
    ));
    // Fast-path rejection happens before the decrement.
    assert_eq!(stores.coordinator.get_stock(&sale).await.unwrap(), Some(4));
    assert_eq!(stores.orders.count_success(&sale).await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_insert_restores_the_counter_and_keeps_the_mark() {
    let stores = TestStores::new();
    let sale = stores.seed_active_sale("flash", 5).await;
    let user = fixtures::user(1);

    // A committed order without a mark models the race where the concurrent
    // winner had not yet written its mark when this request passed the check.
    stores
        .orders
        .insert_order(&sale, &user, OrderStatus::Success)
        .await
        .unwrap();

    let decision = admission(&stores).purchase(&sale, &user).await.unwrap();

    assert!(matches!(
        decision,
        PurchaseDecision::AlreadyPurchased { .. }
    ));
    assert_eq!(stores.coordinator.get_stock(&sale).await.unwrap(), Some(5));
    // The mark written in step 5 is owned by the committed order; the
    // compensation must not clear it.
    assert!(stores.coordinator.has_mark(&sale, &user).await.unwrap());
}
