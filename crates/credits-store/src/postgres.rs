//! PostgreSQL storage implementation.
//!
//! The debit is one conditional `UPDATE .. WHERE remaining_credits >= $cost`,
//! so the database serializes concurrent debits on the row lock. Period
//! creation relies on the `(user_id, period_start, period_end)` unique
//! constraint: a losing insert does nothing and the winner's row is re-read.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use credits_core::{BalanceId, CreditBalance, NewBalance, UserId};

use crate::error::{Result, StoreError};
use crate::schema::POSTGRES_MIGRATIONS;
use crate::{check_cost, DebitOutcome, LedgerStore};

const BALANCE_COLUMNS: &str =
    "id, user_id, remaining_credits, monthly_allowance, period_start, period_end";

/// PostgreSQL-backed storage implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to PostgreSQL using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the connection cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Create the `credit_balances` table and its indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn migrate(&self) -> Result<()> {
        for statement in POSTGRES_MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("credit_balances schema ready");
        Ok(())
    }

    async fn find_by_period(&self, new: &NewBalance) -> Result<Option<CreditBalance>> {
        let row = sqlx::query(&format!(
            "SELECT {BALANCE_COLUMNS} FROM credit_balances
             WHERE user_id = $1 AND period_start = $2 AND period_end = $3"
        ))
        .bind(new.user_id.as_str())
        .bind(new.period.start())
        .bind(new.period.end())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(balance_from_row).transpose()
    }
}

fn balance_from_row(row: &PgRow) -> Result<CreditBalance> {
    let user_id: String = row.try_get("user_id")?;
    Ok(CreditBalance {
        id: BalanceId::new(row.try_get("id")?),
        user_id: UserId::new(user_id).map_err(|e| StoreError::InvalidRecord(e.to_string()))?,
        remaining_credits: row.try_get("remaining_credits")?,
        monthly_allowance: row.try_get("monthly_allowance")?,
        period_start: row.try_get::<DateTime<Utc>, _>("period_start")?,
        period_end: row.try_get::<DateTime<Utc>, _>("period_end")?,
    })
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn find_active_balance(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<CreditBalance>> {
        let row = sqlx::query(&format!(
            "SELECT {BALANCE_COLUMNS} FROM credit_balances
             WHERE user_id = $1 AND period_start <= $2 AND period_end > $2
             ORDER BY period_start DESC
             LIMIT 1"
        ))
        .bind(user_id.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(balance_from_row).transpose()
    }

    async fn create_balance(&self, new: &NewBalance) -> Result<CreditBalance> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO credit_balances
                 (user_id, remaining_credits, monthly_allowance, period_start, period_end)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, period_start, period_end) DO NOTHING
             RETURNING {BALANCE_COLUMNS}"
        ))
        .bind(new.user_id.as_str())
        .bind(new.remaining_credits)
        .bind(new.monthly_allowance)
        .bind(new.period.start())
        .bind(new.period.end())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return balance_from_row(&row);
        }

        tracing::debug!(
            user_id = %new.user_id,
            period_start = %new.period.start(),
            "Balance already created concurrently, reading existing row"
        );

        self.find_by_period(new)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "balance",
                id: format!("{}@{}", new.user_id, new.period.start()),
            })
    }

    async fn try_debit(&self, balance_id: BalanceId, cost: i64) -> Result<DebitOutcome> {
        check_cost(cost)?;

        let row = sqlx::query(
            "UPDATE credit_balances
             SET remaining_credits = remaining_credits - $2
             WHERE id = $1 AND remaining_credits >= $2
             RETURNING remaining_credits",
        )
        .bind(balance_id.get())
        .bind(cost)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(DebitOutcome::Debited {
                remaining_credits: row.try_get("remaining_credits")?,
            });
        }

        // Refused or missing: tell them apart without touching the row.
        let exists = sqlx::query("SELECT 1 FROM credit_balances WHERE id = $1")
            .bind(balance_id.get())
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        if exists {
            Ok(DebitOutcome::Refused)
        } else {
            Err(StoreError::balance_not_found(balance_id))
        }
    }

    async fn list_balances(&self, user_id: &UserId) -> Result<Vec<CreditBalance>> {
        let rows = sqlx::query(&format!(
            "SELECT {BALANCE_COLUMNS} FROM credit_balances
             WHERE user_id = $1
             ORDER BY period_start DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(balance_from_row).collect()
    }
}
