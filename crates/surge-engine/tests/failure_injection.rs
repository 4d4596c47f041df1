//! Compensation-path tests with injected store failures.
//!
//! Verifies that a failure after the decrement never leaves the counter
//! debited, and that coordinator outages degrade to the order-log fallback
//! instead of corrupting state.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use surge_core::coordinator::FastCoordinator;
use surge_core::order::OrderStatus;
use surge_core::orderlog::OrderLog;
use surge_engine::{Admission, EngineError, PurchaseDecision};
use surge_test_utils::failure::{CoordinatorOp, FailingCoordinator, FailingOrderLog, OrderLogOp};
use surge_test_utils::fixtures;

const MARK_TTL: Duration = Duration::from_secs(3600);

struct Harness {
    coordinator: Arc<FailingCoordinator>,
    orders: Arc<FailingOrderLog>,
    pipeline: Admission,
    sale: surge_core::SaleId,
}

async fn harness(stock: u32) -> Harness {
    let coordinator = Arc::new(FailingCoordinator::new());
    let orders = Arc::new(FailingOrderLog::new());
    let sale = fixtures::active_sale("flash", stock);
    let sale_id = sale.id.clone();
    orders.inner().create_sale(sale).await.unwrap();
    coordinator
        .inner()
        .set_stock(&sale_id, i64::from(stock))
        .await
        .unwrap();
    let pipeline = Admission::new(coordinator.clone(), orders.clone(), MARK_TTL);
    Harness {
        coordinator,
        orders,
        pipeline,
        sale: sale_id,
    }
}

#[tokio::test]
async fn fatal_insert_rolls_back_counter_and_mark() {
    let h = harness(5).await;
    let user = fixtures::user(1);
    h.orders.fail_fatal_on(OrderLogOp::InsertOrder);

    let err = h.pipeline.purchase(&h.sale, &user).await.unwrap_err();

    assert!(matches!(err, EngineError::DurableFatal { .. }));
    assert_eq!(
        h.coordinator.get_stock(&h.sale).await.unwrap(),
        Some(5),
        "compensating increment must restore the counter"
    );
    assert!(!h.coordinator.has_mark(&h.sale, &user).await.unwrap());
    assert_eq!(h.orders.count_orders(&h.sale).await.unwrap().total(), 0);
}

#[tokio::test]
async fn transient_insert_failure_compensates_and_allows_retry() {
    let h = harness(5).await;
    let user = fixtures::user(1);
    h.orders.fail_on(OrderLogOp::InsertOrder);

    let err = h.pipeline.purchase(&h.sale, &user).await.unwrap_err();
    assert!(matches!(err, EngineError::Durable { .. }));
    assert_eq!(h.coordinator.get_stock(&h.sale).await.unwrap(), Some(5));
    assert!(!h.coordinator.has_mark(&h.sale, &user).await.unwrap());

    // The injected failure was single-shot; the retry goes through.
    let retry = h.pipeline.purchase(&h.sale, &user).await.unwrap();
    assert!(matches!(retry, PurchaseDecision::Success { .. }));
    assert_eq!(h.coordinator.get_stock(&h.sale).await.unwrap(), Some(4));
}

#[tokio::test]
async fn coordinator_outage_at_decrement_aborts_without_side_effects() {
    let h = harness(5).await;
    let user = fixtures::user(1);
    h.coordinator.fail_on(CoordinatorOp::DecrStock);

    let err = h.pipeline.purchase(&h.sale, &user).await.unwrap_err();

    assert!(matches!(err, EngineError::Coordinator { .. }));
    assert_eq!(h.coordinator.get_stock(&h.sale).await.unwrap(), Some(5));
    assert_eq!(h.orders.count_orders(&h.sale).await.unwrap().total(), 0);
    assert!(!h.coordinator.has_mark(&h.sale, &user).await.unwrap());
}

#[tokio::test]
async fn mark_check_outage_falls_back_to_committed_order() {
    let h = harness(5).await;
    let user = fixtures::user(1);
    h.orders
        .inner()
        .insert_order(&h.sale, &user, OrderStatus::Success)
        .await
        .unwrap();
    h.coordinator.fail_on(CoordinatorOp::HasMark);

    let decision = h.pipeline.purchase(&h.sale, &user).await.unwrap();

    let PurchaseDecision::AlreadyPurchased { order } = decision else {
        panic!("expected already purchased, got {decision:?}");
    };
    assert!(order.is_some(), "fallback path should return the order");
    assert_eq!(h.coordinator.get_stock(&h.sale).await.unwrap(), Some(5));
}

#[tokio::test]
async fn mark_check_outage_without_order_continues_to_admission() {
    let h = harness(5).await;
    let user = fixtures::user(1);
    h.coordinator.fail_on(CoordinatorOp::HasMark);

    let decision = h.pipeline.purchase(&h.sale, &user).await.unwrap();

    assert!(matches!(decision, PurchaseDecision::Success { .. }));
    assert_eq!(h.coordinator.get_stock(&h.sale).await.unwrap(), Some(4));
}

#[tokio::test]
async fn mark_write_failure_does_not_block_the_purchase() {
    let h = harness(5).await;
    let user = fixtures::user(1);
    h.coordinator.fail_on(CoordinatorOp::SetMark);

    let decision = h.pipeline.purchase(&h.sale, &user).await.unwrap();

    assert!(matches!(decision, PurchaseDecision::Success { .. }));
    assert_eq!(h.orders.count_success(&h.sale).await.unwrap(), 1);
    // The advisory mark was lost; the uniqueness constraint still rejects a
    // repeat attempt.
    let repeat = h.pipeline.purchase(&h.sale, &user).await.unwrap();
    assert!(matches!(
        repeat,
        PurchaseDecision::AlreadyPurchased { .. }
    ));
    assert_eq!(h.coordinator.get_stock(&h.sale).await.unwrap(), Some(4));
}

#[tokio::test]
async fn total_order_log_outage_surfaces_as_transient_error() {
    let h = harness(5).await;
    h.orders.fail_all();

    let err = h
        .pipeline
        .purchase(&h.sale, &fixtures::user(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Durable { .. }));

    h.orders.heal();
    let decision = h
        .pipeline
        .purchase(&h.sale, &fixtures::user(1))
        .await
        .unwrap();
    assert!(matches!(decision, PurchaseDecision::Success { .. }));
}
