//! Active period resolution.
//!
//! Guarantees one active balance per user at any instant. Period bounds come
//! from the clock alone (UTC calendar month), so concurrent resolvers for the
//! same user compute the same key and meet on the store's insert-or-fetch
//! instead of opening two periods. No locks are taken here.

use std::sync::Arc;

use credits_core::{BillingPeriod, CreditBalance, NewBalance, UserId, DEFAULT_MONTHLY_ALLOWANCE};
use credits_store::LedgerStore;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;

/// Finds or opens the active balance for a user.
#[derive(Clone)]
pub struct PeriodResolver {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    monthly_allowance: i64,
}

impl PeriodResolver {
    /// Resolver on the system clock with the default allowance.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            monthly_allowance: DEFAULT_MONTHLY_ALLOWANCE,
        }
    }

    /// Use a different time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Grant `allowance` credits to newly opened periods.
    #[must_use]
    pub fn with_monthly_allowance(mut self, allowance: i64) -> Self {
        self.monthly_allowance = allowance;
        self
    }

    /// Allowance granted to newly opened periods.
    #[must_use]
    pub const fn monthly_allowance(&self) -> i64 {
        self.monthly_allowance
    }

    /// The current instant on the resolver's clock.
    #[must_use]
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Return the user's active balance, opening this month's period with the
    /// full allowance if none exists.
    ///
    /// Safe to call concurrently for the same user: every caller receives the
    /// same row.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Store` if the store fails (retryable per the error).
    /// - `LedgerError::Billing` if the configured allowance is not positive.
    pub async fn ensure_active_period(&self, user_id: &UserId) -> Result<CreditBalance> {
        let now = self.clock.now();

        if let Some(balance) = self.store.find_active_balance(user_id, now).await? {
            tracing::debug!(
                user_id = %user_id,
                balance_id = %balance.id,
                remaining = balance.remaining_credits,
                "Active period found"
            );
            return Ok(balance);
        }

        let period = BillingPeriod::calendar_month(now)?;
        let new = NewBalance::full_allowance(user_id.clone(), self.monthly_allowance, period)?;
        let balance = self.store.create_balance(&new).await?;

        tracing::info!(
            user_id = %user_id,
            balance_id = %balance.id,
            period_start = %balance.period_start,
            period_end = %balance.period_end,
            allowance = balance.monthly_allowance,
            "Billing period opened"
        );

        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use credits_store::MemoryStore;

    use crate::clock::ManualClock;
    use crate::error::LedgerError;

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    #[tokio::test]
    async fn opens_calendar_month_with_allowance() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
        ));
        let resolver = PeriodResolver::new(store.clone()).with_clock(clock);

        let balance = resolver.ensure_active_period(&user("a")).await.unwrap();

        assert_eq!(
            balance.period_start,
            Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            balance.period_end,
            Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(balance.remaining_credits, DEFAULT_MONTHLY_ALLOWANCE);
        assert_eq!(balance.monthly_allowance, DEFAULT_MONTHLY_ALLOWANCE);
    }

    #[tokio::test]
    async fn repeated_resolution_reuses_row() {
        let store = Arc::new(MemoryStore::new());
        let resolver = PeriodResolver::new(store.clone());

        let first = resolver.ensure_active_period(&user("a")).await.unwrap();
        let second = resolver.ensure_active_period(&user("a")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.balance_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn custom_allowance() {
        let store = Arc::new(MemoryStore::new());
        let resolver = PeriodResolver::new(store).with_monthly_allowance(250);

        let balance = resolver.ensure_active_period(&user("a")).await.unwrap();
        assert_eq!(balance.remaining_credits, 250);
        assert_eq!(balance.monthly_allowance, 250);
    }

    #[tokio::test]
    async fn non_positive_allowance_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let resolver = PeriodResolver::new(store.clone()).with_monthly_allowance(0);

        let err = resolver.ensure_active_period(&user("a")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Billing(_)));
        assert_eq!(store.balance_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let resolver = PeriodResolver::new(store.clone());

        let err = resolver.ensure_active_period(&user("a")).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
