//! Store instrumentation.
//!
//! [`InstrumentedStore`] wraps any [`LedgerStore`] and logs the duration and
//! outcome of every call, so backends stay free of logging concerns.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use credits_core::{BalanceId, CreditBalance, NewBalance, UserId};
use credits_store::{DebitOutcome, LedgerStore, Result};

/// A [`LedgerStore`] that records timing and outcome for each operation.
pub struct InstrumentedStore<S> {
    inner: S,
    backend: &'static str,
}

impl<S: LedgerStore> InstrumentedStore<S> {
    /// Wrap `inner`, tagging events with `backend`.
    #[must_use]
    pub fn new(inner: S, backend: &'static str) -> Self {
        Self { inner, backend }
    }

    /// The wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn observe<T>(&self, operation: &'static str, started: Instant, result: &Result<T>) {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(_) => tracing::debug!(
                backend = self.backend,
                operation,
                duration_ms,
                status = "success",
                "Store call completed"
            ),
            Err(err) => tracing::error!(
                backend = self.backend,
                operation,
                duration_ms,
                status = "error",
                error = %err,
                "Store call failed"
            ),
        }
    }
}

#[async_trait]
impl<S: LedgerStore> LedgerStore for InstrumentedStore<S> {
    async fn find_active_balance(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<CreditBalance>> {
        let started = Instant::now();
        let result = self.inner.find_active_balance(user_id, now).await;
        self.observe("find_active_balance", started, &result);
        result
    }

    async fn create_balance(&self, new: &NewBalance) -> Result<CreditBalance> {
        let started = Instant::now();
        let result = self.inner.create_balance(new).await;
        self.observe("create_balance", started, &result);
        result
    }

    async fn try_debit(&self, balance_id: BalanceId, cost: i64) -> Result<DebitOutcome> {
        let started = Instant::now();
        let result = self.inner.try_debit(balance_id, cost).await;
        self.observe("try_debit", started, &result);
        result
    }

    async fn list_balances(&self, user_id: &UserId) -> Result<Vec<CreditBalance>> {
        let started = Instant::now();
        let result = self.inner.list_balances(user_id).await;
        self.observe("list_balances", started, &result);
        result
    }
}
