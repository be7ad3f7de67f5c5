//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `LedgerStore` trait.
//! Read-modify-write operations run under a store-wide write lock and commit
//! through a single `WriteBatch`, so a debit check and its decrement are one
//! atomic step for every caller sharing the handle.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use credits_core::{BalanceId, CreditBalance, NewBalance, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, NEXT_BALANCE_ID_KEY};
use crate::{check_cost, DebitOutcome, LedgerStore};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a balance by ID regardless of period.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_balance(&self, balance_id: BalanceId) -> Result<Option<CreditBalance>> {
        let cf = self.cf(cf::BALANCES)?;

        self.db
            .get_cf(&cf, keys::balance_key(balance_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Load every balance indexed under `user_id`, in ascending period order.
    fn scan_user(&self, user_id: &UserId) -> Result<Vec<CreditBalance>> {
        let cf_index = self.cf(cf::BALANCES_BY_PERIOD)?;
        let prefix = keys::user_prefix(user_id);

        let iter = self
            .db
            .iterator_cf(&cf_index, IteratorMode::From(&prefix, Direction::Forward));

        let mut balances = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }
            // A longer user ID sharing this prefix ("a" vs "a\0x").
            if !keys::is_user_period_key(&prefix, &key) {
                continue;
            }

            let balance_id = keys::decode_balance_id(&value).ok_or_else(|| {
                StoreError::Serialization("malformed balance index entry".into())
            })?;
            match self.get_balance(balance_id)? {
                Some(balance) if balance.user_id == *user_id => balances.push(balance),
                _ => {}
            }
        }

        Ok(balances)
    }

    fn find_by_period(&self, new: &NewBalance) -> Result<Option<CreditBalance>> {
        let cf_index = self.cf(cf::BALANCES_BY_PERIOD)?;
        let key = keys::period_key(&new.user_id, new.period.start(), new.period.end());

        match self
            .db
            .get_cf(&cf_index, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        {
            Some(value) => {
                let balance_id = keys::decode_balance_id(&value).ok_or_else(|| {
                    StoreError::Serialization("malformed balance index entry".into())
                })?;
                self.get_balance(balance_id)
            }
            None => Ok(None),
        }
    }

    fn next_balance_id(&self) -> Result<BalanceId> {
        let cf_meta = self.cf(cf::META)?;
        let last = self
            .db
            .get_cf(&cf_meta, NEXT_BALANCE_ID_KEY)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| {
                keys::decode_balance_id(&data)
                    .ok_or_else(|| StoreError::Serialization("malformed id counter".into()))
            })
            .transpose()?
            .map_or(0, BalanceId::get);

        Ok(BalanceId::new(last + 1))
    }
}

#[async_trait]
impl LedgerStore for RocksStore {
    async fn find_active_balance(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<CreditBalance>> {
        // Index keys sort by period start, so the last match is the newest.
        Ok(self
            .scan_user(user_id)?
            .into_iter()
            .rev()
            .find(|b| b.is_active_at(now)))
    }

    async fn create_balance(&self, new: &NewBalance) -> Result<CreditBalance> {
        let _guard = self.lock_writes()?;

        if let Some(existing) = self.find_by_period(new)? {
            return Ok(existing);
        }

        let cf_balances = self.cf(cf::BALANCES)?;
        let cf_index = self.cf(cf::BALANCES_BY_PERIOD)?;
        let cf_meta = self.cf(cf::META)?;

        let balance_id = self.next_balance_id()?;
        let balance = CreditBalance::from_new(balance_id, new);

        let balance_key = keys::balance_key(balance_id);
        let index_key = keys::period_key(&new.user_id, new.period.start(), new.period.end());
        let value = Self::serialize(&balance)?;

        // Write atomically
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_balances, &balance_key, &value);
        batch.put_cf(&cf_index, &index_key, &balance_key);
        batch.put_cf(&cf_meta, NEXT_BALANCE_ID_KEY, &balance_key);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(balance)
    }

    async fn try_debit(&self, balance_id: BalanceId, cost: i64) -> Result<DebitOutcome> {
        check_cost(cost)?;
        let _guard = self.lock_writes()?;

        let mut balance = self
            .get_balance(balance_id)?
            .ok_or_else(|| StoreError::balance_not_found(balance_id))?;

        if !balance.can_afford(cost) {
            return Ok(DebitOutcome::Refused);
        }

        balance.remaining_credits -= cost;

        let cf_balances = self.cf(cf::BALANCES)?;
        let value = Self::serialize(&balance)?;
        self.db
            .put_cf(&cf_balances, keys::balance_key(balance_id), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(DebitOutcome::Debited {
            remaining_credits: balance.remaining_credits,
        })
    }

    async fn list_balances(&self, user_id: &UserId) -> Result<Vec<CreditBalance>> {
        let mut balances = self.scan_user(user_id)?;
        balances.reverse();
        Ok(balances)
    }
}
