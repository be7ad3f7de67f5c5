//! In-memory storage implementation.
//!
//! Every operation runs under one mutex, which gives `try_debit` and
//! `create_balance` the same all-or-nothing behavior as a conditional SQL
//! statement. Useful for tests and for embedding without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use credits_core::{BalanceId, CreditBalance, NewBalance, UserId};

use crate::error::{Result, StoreError};
use crate::{check_cost, DebitOutcome, LedgerStore};

type PeriodKey = (UserId, DateTime<Utc>, DateTime<Utc>);

#[derive(Default)]
struct Tables {
    next_id: i64,
    balances: BTreeMap<BalanceId, CreditBalance>,
    by_period: HashMap<PeriodKey, BalanceId>,
}

/// In-process ledger store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable` until
    /// switched back. Used to exercise error propagation.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of balance rows across all users and periods.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn balance_count(&self) -> Result<usize> {
        Ok(self.lock()?.balances.len())
    }

    /// Get a balance by ID regardless of period.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn get_balance(&self, balance_id: BalanceId) -> Result<Option<CreditBalance>> {
        Ok(self.lock()?.balances.get(&balance_id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn find_active_balance(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<CreditBalance>> {
        let tables = self.lock()?;
        Ok(tables
            .balances
            .values()
            .filter(|b| &b.user_id == user_id && b.is_active_at(now))
            .max_by_key(|b| b.period_start)
            .cloned())
    }

    async fn create_balance(&self, new: &NewBalance) -> Result<CreditBalance> {
        let mut tables = self.lock()?;
        let key = (new.user_id.clone(), new.period.start(), new.period.end());

        if let Some(existing) = tables
            .by_period
            .get(&key)
            .and_then(|id| tables.balances.get(id))
        {
            return Ok(existing.clone());
        }

        tables.next_id += 1;
        let balance = CreditBalance::from_new(BalanceId::new(tables.next_id), new);
        tables.by_period.insert(key, balance.id);
        tables.balances.insert(balance.id, balance.clone());

        Ok(balance)
    }

    async fn try_debit(&self, balance_id: BalanceId, cost: i64) -> Result<DebitOutcome> {
        check_cost(cost)?;
        let mut tables = self.lock()?;

        let balance = tables
            .balances
            .get_mut(&balance_id)
            .ok_or_else(|| StoreError::balance_not_found(balance_id))?;

        if !balance.can_afford(cost) {
            return Ok(DebitOutcome::Refused);
        }

        balance.remaining_credits -= cost;
        Ok(DebitOutcome::Debited {
            remaining_credits: balance.remaining_credits,
        })
    }

    async fn list_balances(&self, user_id: &UserId) -> Result<Vec<CreditBalance>> {
        let tables = self.lock()?;
        let mut balances: Vec<_> = tables
            .balances
            .values()
            .filter(|b| &b.user_id == user_id)
            .cloned()
            .collect();
        balances.sort_by(|a, b| b.period_start.cmp(&a.period_start));
        Ok(balances)
    }
}
