//! Schema definitions for the storage backends.
//!
//! `RocksDB` uses column families; PostgreSQL uses a single `credit_balances`
//! table with a uniqueness constraint over `(user_id, period_start, period_end)`.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Balance records, keyed by `balance_id` (big-endian `i64`).
    pub const BALANCES: &str = "balances";

    /// Index: balances by user and period, keyed by
    /// `user_id || 0x00 || period_start || period_end`. Value is the `balance_id`.
    pub const BALANCES_BY_PERIOD: &str = "balances_by_period";

    /// Counters and other bookkeeping.
    pub const META: &str = "meta";
}

/// Key in [`cf::META`] holding the last assigned balance ID.
pub const NEXT_BALANCE_ID_KEY: &[u8] = b"next_balance_id";

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::BALANCES, cf::BALANCES_BY_PERIOD, cf::META]
}

/// PostgreSQL DDL, applied in order by `PgStore::migrate`.
pub const POSTGRES_MIGRATIONS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS credit_balances (
        id BIGSERIAL PRIMARY KEY,
        user_id TEXT NOT NULL,
        remaining_credits BIGINT NOT NULL CHECK (remaining_credits >= 0),
        monthly_allowance BIGINT NOT NULL CHECK (monthly_allowance > 0),
        period_start TIMESTAMPTZ NOT NULL,
        period_end TIMESTAMPTZ NOT NULL,
        CHECK (period_start < period_end),
        CONSTRAINT credit_balances_user_period_key UNIQUE (user_id, period_start, period_end)
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS credit_balances_user_id_idx
        ON credit_balances (user_id)
    ",
];
