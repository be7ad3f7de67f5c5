//! Storage layer for the credit ledger.
//!
//! The [`LedgerStore`] trait is the persistence boundary: it finds the active
//! balance for a user, opens a new period balance, and performs the atomic
//! conditional debit. Every adapter must implement `try_debit` as a single
//! conditional update so concurrent debits can never overspend a balance.
//!
//! # Backends
//!
//! - [`MemoryStore`]: in-process, for tests and embedding
//! - [`PgStore`]: PostgreSQL via `sqlx`
//! - `RocksStore`: embedded `RocksDB` (feature `rocksdb-backend`)
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use credits_core::{BillingPeriod, NewBalance, UserId};
//! use credits_store::{LedgerStore, MemoryStore};
//!
//! # async fn demo() -> credits_store::Result<()> {
//! let store = MemoryStore::new();
//! let user_id = UserId::new("user-1").unwrap();
//! let period = BillingPeriod::calendar_month(Utc::now()).unwrap();
//! let new = NewBalance::full_allowance(user_id.clone(), 10_000, period).unwrap();
//!
//! let balance = store.create_balance(&new).await?;
//! let remaining = store.debit(balance.id, 250).await?;
//! assert_eq!(remaining, 9_750);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
#[cfg(feature = "rocksdb-backend")]
pub mod keys;
pub mod memory;
pub mod postgres;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use credits_core::{BalanceId, CreditBalance, NewBalance, UserId};

/// Result of a conditional debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The balance covered the cost and was decremented.
    Debited {
        /// Balance after the decrement.
        remaining_credits: i64,
    },
    /// The balance was below the cost; nothing was changed.
    Refused,
}

impl DebitOutcome {
    /// Whether the debit was applied.
    #[must_use]
    pub const fn is_debited(&self) -> bool {
        matches!(self, Self::Debited { .. })
    }
}

/// The storage trait defining all ledger persistence operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., PostgreSQL, `RocksDB`, in-memory for testing). All operations are
/// round trips to the backing store and may be cancelled by dropping the future.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Find the balance whose period contains `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_active_balance(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<CreditBalance>>;

    /// Insert a balance, or return the existing row for the same
    /// `(user_id, period_start, period_end)` key.
    ///
    /// Concurrent callers with the same key all receive the same row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_balance(&self, new: &NewBalance) -> Result<CreditBalance>;

    /// Atomically subtract `cost` from the balance if, and only if,
    /// `remaining_credits >= cost`.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the balance doesn't exist.
    /// - `StoreError::InvalidRecord` if `cost` is negative.
    async fn try_debit(&self, balance_id: BalanceId, cost: i64) -> Result<DebitOutcome>;

    /// List every balance for a user, newest period first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_balances(&self, user_id: &UserId) -> Result<Vec<CreditBalance>>;

    /// Debit `cost`, treating a refusal as an error.
    ///
    /// Returns the balance after the decrement.
    ///
    /// # Errors
    ///
    /// - `StoreError::InsufficientCredits` if the debit was refused.
    /// - Any error from [`LedgerStore::try_debit`].
    async fn debit(&self, balance_id: BalanceId, cost: i64) -> Result<i64> {
        match self.try_debit(balance_id, cost).await? {
            DebitOutcome::Debited { remaining_credits } => Ok(remaining_credits),
            DebitOutcome::Refused => Err(StoreError::InsufficientCredits {
                balance_id,
                required: cost,
            }),
        }
    }
}

#[async_trait]
impl<S: LedgerStore + ?Sized> LedgerStore for std::sync::Arc<S> {
    async fn find_active_balance(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<CreditBalance>> {
        (**self).find_active_balance(user_id, now).await
    }

    async fn create_balance(&self, new: &NewBalance) -> Result<CreditBalance> {
        (**self).create_balance(new).await
    }

    async fn try_debit(&self, balance_id: BalanceId, cost: i64) -> Result<DebitOutcome> {
        (**self).try_debit(balance_id, cost).await
    }

    async fn list_balances(&self, user_id: &UserId) -> Result<Vec<CreditBalance>> {
        (**self).list_balances(user_id).await
    }
}

/// Reject negative debit amounts before they reach a backend.
pub(crate) fn check_cost(cost: i64) -> Result<()> {
    if cost < 0 {
        return Err(StoreError::InvalidRecord(format!(
            "debit cost must be non-negative, got {cost}"
        )));
    }
    Ok(())
}
