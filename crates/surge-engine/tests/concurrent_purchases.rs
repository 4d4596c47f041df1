//! Admission invariants under concurrent traffic.
//!
//! These tests drive bursts of parallel purchase attempts through a shared
//! pipeline and verify the two core guarantees: accepted purchases never
//! exceed stock, and no buyer obtains more than one unit.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinSet;

use surge_core::coordinator::FastCoordinator;
use surge_core::orderlog::OrderLog;
use surge_engine::{Admission, PurchaseDecision, StatusReader};
use surge_test_utils::fixtures::{self, TestStores};

const MARK_TTL: Duration = Duration::from_secs(3600);

fn admission(stores: &TestStores) -> Admission {
    Admission::new(stores.coordinator.clone(), stores.orders.clone(), MARK_TTL)
}

#[derive(Default)]
struct Tally {
    success: usize,
    already: usize,
    sold_out: usize,
    other: usize,
}

impl Tally {
    fn add(&mut self, decision: &PurchaseDecision) {
        match decision {
            PurchaseDecision::Success { .. } => self.success += 1,
            PurchaseDecision::AlreadyPurchased { .. } => self.already += 1,
            PurchaseDecision::SoldOut => self.sold_out += 1,
            _ => self.other += 1,
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn exact_sellout_under_contention() {
    let stores = TestStores::new();
    let sale = stores.seed_active_sale("drop", 100).await;
    let pipeline = admission(&stores);

    let mut attempts = JoinSet::new();
    for n in 0..500 {
        let pipeline = pipeline.clone();
        let sale = sale.clone();
        attempts.spawn(async move { pipeline.purchase(&sale, &fixtures::user(n)).await });
    }

    let mut tally = Tally::default();
    while let Some(joined) = attempts.join_next().await {
        tally.add(&joined.unwrap().unwrap());
    }

    assert_eq!(tally.success, 100);
    assert_eq!(tally.sold_out, 400);
    assert_eq!(tally.already, 0);
    assert_eq!(tally.other, 0);
    assert_eq!(stores.orders.count_success(&sale).await.unwrap(), 100);
    assert_eq!(stores.coordinator.get_stock(&sale).await.unwrap(), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn same_buyer_burst_wins_exactly_once() {
    let stores = TestStores::new();
    let sale = stores.seed_active_sale("drop", 10).await;
    let pipeline = admission(&stores);
    let user = fixtures::user(0);

    let mut attempts = JoinSet::new();
    for _ in 0..200 {
        let pipeline = pipeline.clone();
        let sale = sale.clone();
        let user = user.clone();
        attempts.spawn(async move { pipeline.purchase(&sale, &user).await });
    }

    let mut tally = Tally::default();
    while let Some(joined) = attempts.join_next().await {
        tally.add(&joined.unwrap().unwrap());
    }

    assert_eq!(tally.success, 1);
    assert_eq!(tally.already, 199);
    assert_eq!(tally.sold_out, 0);
    assert_eq!(stores.orders.count_success(&sale).await.unwrap(), 1);
    // Same-user losers compensate their decrements: nine units remain.
    assert_eq!(stores.coordinator.get_stock(&sale).await.unwrap(), Some(9));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn mixed_repeat_traffic_never_oversells() {
    let stores = TestStores::new();
    let sale = stores.seed_active_sale("drop", 30).await;
    let pipeline = admission(&stores);

    // 50 buyers racing for 30 units, each retrying up to 4 times.
    let mut buyers = JoinSet::new();
    for n in 0..50 {
        let pipeline = pipeline.clone();
        let sale = sale.clone();
        buyers.spawn(async move {
            let mut decisions = Vec::new();
            for _ in 0..4 {
                decisions.push(pipeline.purchase(&sale, &fixtures::user(n)).await);
            }
            decisions
        });
    }

    let mut successes_per_user: HashMap<String, usize> = HashMap::new();
    while let Some(joined) = buyers.join_next().await {
        for decision in joined.unwrap() {
            if let PurchaseDecision::Success { order, .. } = decision.unwrap() {
                *successes_per_user
                    .entry(order.user_id.as_str().to_string())
                    .or_default() += 1;
            }
        }
    }

    assert_eq!(successes_per_user.len(), 30);
    assert!(successes_per_user.values().all(|&count| count == 1));
    assert_eq!(stores.orders.count_success(&sale).await.unwrap(), 30);
    assert_eq!(stores.coordinator.get_stock(&sale).await.unwrap(), Some(0));
}

#[tokio::test]
async fn remaining_stock_is_monotonic_under_purchases() {
    let stores = TestStores::new();
    let sale = stores.seed_active_sale("drop", 20).await;
    let pipeline = admission(&stores);
    let reader = StatusReader::new(stores.coordinator.clone(), stores.orders.clone());

    let mut last = reader
        .sale_status(&sale)
        .await
        .unwrap()
        .unwrap()
        .remaining_stock;
    for n in 0..20 {
        pipeline.purchase(&sale, &fixtures::user(n)).await.unwrap();
        let now = reader
            .sale_status(&sale)
            .await
            .unwrap()
            .unwrap()
            .remaining_stock;
        assert!(now <= last, "remaining stock increased: {last} -> {now}");
        last = now;
    }
    assert_eq!(last, 0);
}
