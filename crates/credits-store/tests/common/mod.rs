//! Backend-agnostic checks every `LedgerStore` adapter must pass.

#![allow(dead_code)] // Each test binary drives a different subset of backends

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use credits_core::{BillingPeriod, NewBalance, UserId};
use credits_store::{DebitOutcome, LedgerStore, StoreError};

static USER_SEQ: AtomicU64 = AtomicU64::new(0);

/// A unique user ID so runs against a shared database do not collide.
pub fn unique_user(tag: &str) -> UserId {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = USER_SEQ.fetch_add(1, Ordering::Relaxed);
    UserId::new(format!("{tag}-{nanos}-{seq}")).unwrap()
}

pub fn instant(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub fn month_of(instant: DateTime<Utc>) -> BillingPeriod {
    BillingPeriod::calendar_month(instant).unwrap()
}

pub async fn create_then_find<S: LedgerStore>(store: &S) {
    let user = unique_user("find");
    let now = instant(2026, 10, 18);
    assert!(store.find_active_balance(&user, now).await.unwrap().is_none());

    let new = NewBalance::full_allowance(user.clone(), 10_000, month_of(now)).unwrap();
    let created = store.create_balance(&new).await.unwrap();
    assert_eq!(created.user_id, user);
    assert_eq!(created.remaining_credits, 10_000);
    assert_eq!(created.monthly_allowance, 10_000);

    let found = store.find_active_balance(&user, now).await.unwrap();
    assert_eq!(found.map(|b| b.id), Some(created.id));

    // Half-open: the first instant of next month is outside.
    let next = month_of(now).end();
    assert!(store.find_active_balance(&user, next).await.unwrap().is_none());
}

pub async fn create_returns_existing_row<S: LedgerStore>(store: &S) {
    let user = unique_user("dup");
    let period = month_of(instant(2026, 10, 18));

    let first = NewBalance::full_allowance(user.clone(), 10_000, period).unwrap();
    let second = NewBalance::full_allowance(user.clone(), 42, period).unwrap();

    let a = store.create_balance(&first).await.unwrap();
    let b = store.create_balance(&second).await.unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(b.monthly_allowance, 10_000);
    assert_eq!(store.list_balances(&user).await.unwrap().len(), 1);
}

pub async fn conditional_debit<S: LedgerStore>(store: &S) {
    let user = unique_user("debit");
    let period = month_of(instant(2026, 10, 18));
    let balance = store
        .create_balance(&NewBalance::full_allowance(user.clone(), 100, period).unwrap())
        .await
        .unwrap();

    assert_eq!(
        store.try_debit(balance.id, 100).await.unwrap(),
        DebitOutcome::Debited {
            remaining_credits: 0
        }
    );
    assert_eq!(
        store.try_debit(balance.id, 1).await.unwrap(),
        DebitOutcome::Refused
    );
    // Zero-cost debits always pass and leave the balance alone.
    assert_eq!(
        store.try_debit(balance.id, 0).await.unwrap(),
        DebitOutcome::Debited {
            remaining_credits: 0
        }
    );
    assert!(matches!(
        store.debit(balance.id, 1).await,
        Err(StoreError::InsufficientCredits { required: 1, .. })
    ));

    let stored = store
        .find_active_balance(&user, instant(2026, 10, 18))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.remaining_credits, 0);
}

pub async fn history_newest_first<S: LedgerStore>(store: &S) {
    let user = unique_user("history");
    for month in [8, 9, 10] {
        let period = month_of(instant(2026, month, 5));
        store
            .create_balance(&NewBalance::full_allowance(user.clone(), 100, period).unwrap())
            .await
            .unwrap();
    }

    let history = store.list_balances(&user).await.unwrap();
    let starts: Vec<_> = history.iter().map(|b| b.period_start).collect();
    assert_eq!(
        starts,
        vec![
            month_of(instant(2026, 10, 5)).start(),
            month_of(instant(2026, 9, 5)).start(),
            month_of(instant(2026, 8, 5)).start(),
        ]
    );
}

/// A user ID that extends another with a NUL byte owns nothing of the shorter
/// one, and vice versa. PostgreSQL `TEXT` rejects NUL, so only the embedded
/// backends run this.
pub async fn users_sharing_a_prefix_stay_separate<S: LedgerStore>(store: &S) {
    let short = unique_user("prefix");
    let long = UserId::new(format!("{short}\u{0}x")).unwrap();
    let now = instant(2026, 10, 18);

    let theirs = store
        .create_balance(&NewBalance::full_allowance(long.clone(), 500, month_of(now)).unwrap())
        .await
        .unwrap();

    assert!(store.find_active_balance(&short, now).await.unwrap().is_none());
    assert!(store.list_balances(&short).await.unwrap().is_empty());

    let ours = store
        .create_balance(&NewBalance::full_allowance(short.clone(), 100, month_of(now)).unwrap())
        .await
        .unwrap();
    assert_ne!(ours.id, theirs.id);

    let found = store.find_active_balance(&short, now).await.unwrap().unwrap();
    assert_eq!(found.id, ours.id);
    assert_eq!(found.user_id, short);

    let history = store.list_balances(&short).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, ours.id);

    let history = store.list_balances(&long).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, theirs.id);
}

/// `tasks` concurrent debits of `cost` against `allowance`.
pub async fn concurrent_debits<S: LedgerStore + 'static>(
    store: Arc<S>,
    allowance: i64,
    cost: i64,
    tasks: usize,
) {
    let user = unique_user("race");
    let period = month_of(instant(2026, 10, 18));
    let balance = store
        .create_balance(&NewBalance::full_allowance(user.clone(), allowance, period).unwrap())
        .await
        .unwrap();

    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.try_debit(balance.id, cost).await.unwrap() })
        })
        .collect();

    let debited = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .filter(DebitOutcome::is_debited)
        .count();

    let expected = usize::try_from(allowance / cost).unwrap().min(tasks);
    assert_eq!(debited, expected);

    let stored = store
        .find_active_balance(&user, instant(2026, 10, 18))
        .await
        .unwrap()
        .unwrap();
    let spent = i64::try_from(expected).unwrap() * cost;
    assert_eq!(stored.remaining_credits, allowance - spent);
}

/// Concurrent creators for one key must all see the same single row.
pub async fn concurrent_creates<S: LedgerStore + 'static>(store: Arc<S>, tasks: usize) {
    let user = unique_user("create-race");
    let period = month_of(instant(2026, 10, 18));

    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let store = Arc::clone(&store);
            let new = NewBalance::full_allowance(user.clone(), 10_000, period).unwrap();
            tokio::spawn(async move { store.create_balance(&new).await.unwrap() })
        })
        .collect();

    let created: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(created.iter().all(|b| b.id == created[0].id));
    assert_eq!(store.list_balances(&user).await.unwrap().len(), 1);
}
