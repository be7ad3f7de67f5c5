//! Billing period rollover integration tests.

mod common;

use chrono::Duration;
use common::{at, TestHarness};
use credits_core::{HAIKU_MODEL, SONNET_MODEL};

#[tokio::test]
async fn new_month_opens_fresh_allowance() {
    let harness = TestHarness::new();

    harness
        .billing
        .record_usage(&harness.user_id, 50_000, 10_000, SONNET_MODEL)
        .await
        .unwrap();
    assert_eq!(harness.remaining().await, 7_000);

    harness.clock.set(at(2026, 11, 3, 8, 0, 0));
    assert_eq!(harness.remaining().await, 10_000);

    let history = harness
        .billing
        .balance_history(&harness.user_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);

    // Newest first; October is kept untouched.
    assert_eq!(history[0].period_start, at(2026, 11, 1, 0, 0, 0));
    assert_eq!(history[0].remaining_credits, 10_000);
    assert_eq!(history[1].period_start, at(2026, 10, 1, 0, 0, 0));
    assert_eq!(history[1].period_end, at(2026, 11, 1, 0, 0, 0));
    assert_eq!(history[1].remaining_credits, 7_000);
}

#[tokio::test]
async fn period_end_is_exclusive() {
    let harness = TestHarness::new();
    harness.clock.set(at(2026, 10, 31, 23, 59, 59));

    let october = harness.billing.active_balance(&harness.user_id).await.unwrap();
    assert_eq!(october.period_start, at(2026, 10, 1, 0, 0, 0));

    harness.clock.advance(Duration::seconds(1));

    let november = harness.billing.active_balance(&harness.user_id).await.unwrap();
    assert_ne!(november.id, october.id);
    assert_eq!(november.period_start, october.period_end);
    assert_eq!(november.period_end, at(2026, 12, 1, 0, 0, 0));
}

#[tokio::test]
async fn exhausted_user_recovers_next_month() {
    let harness = TestHarness::with_allowance(800);

    harness
        .billing
        .record_usage(&harness.user_id, 100_000, 0, HAIKU_MODEL)
        .await
        .unwrap();
    assert!(!harness
        .billing
        .check_credits(&harness.user_id)
        .await
        .unwrap()
        .has_credits);

    harness.clock.set(at(2026, 11, 1, 0, 0, 0));

    let check = harness.billing.check_credits(&harness.user_id).await.unwrap();
    assert!(check.has_credits);
    assert_eq!(check.remaining_credits, 800);
}

#[tokio::test]
async fn december_rolls_into_january() {
    let harness = TestHarness::new();
    harness.clock.set(at(2026, 12, 20, 0, 0, 0));

    let december = harness.billing.active_balance(&harness.user_id).await.unwrap();
    assert_eq!(december.period_end, at(2027, 1, 1, 0, 0, 0));

    harness.clock.set(at(2027, 1, 2, 0, 0, 0));

    let january = harness.billing.active_balance(&harness.user_id).await.unwrap();
    assert_eq!(january.period_start, at(2027, 1, 1, 0, 0, 0));
    assert_eq!(january.period_end, at(2027, 2, 1, 0, 0, 0));
}

#[tokio::test]
async fn debits_land_in_the_current_period_only() {
    let harness = TestHarness::new();
    harness.billing.check_credits(&harness.user_id).await.unwrap();

    harness.clock.set(at(2026, 11, 15, 0, 0, 0));
    harness
        .billing
        .record_usage(&harness.user_id, 100_000, 0, HAIKU_MODEL)
        .await
        .unwrap();

    let history = harness
        .billing
        .balance_history(&harness.user_id)
        .await
        .unwrap();
    assert_eq!(history[0].remaining_credits, 9_200);
    assert_eq!(history[1].remaining_credits, 10_000);
}
