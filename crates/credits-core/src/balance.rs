//! Credit balance types.
//!
//! A `CreditBalance` is the per-user, per-period record of remaining spending
//! capacity. Periods are half-open UTC calendar months.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::ids::{BalanceId, UserId};

/// Credits granted at the start of every period unless configured otherwise.
pub const DEFAULT_MONTHLY_ALLOWANCE: i64 = 10_000;

/// A half-open billing interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl BillingPeriod {
    /// Create a period from explicit bounds.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidPeriod` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(BillingError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// The UTC calendar month containing `instant`.
    ///
    /// Two callers evaluating any instant of the same month get identical
    /// bounds, which is what lets concurrent creators collide on one row.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidPeriod` only if the month lies outside
    /// chrono's representable range.
    pub fn calendar_month(instant: DateTime<Utc>) -> Result<Self> {
        let start = month_start(instant.year(), instant.month()).ok_or(
            BillingError::InvalidPeriod {
                start: instant,
                end: instant,
            },
        )?;
        let (next_year, next_month) = if instant.month() == 12 {
            (instant.year() + 1, 1)
        } else {
            (instant.year(), instant.month() + 1)
        };
        let end = month_start(next_year, next_month).ok_or(BillingError::InvalidPeriod {
            start,
            end: start,
        })?;
        Self::new(start, end)
    }

    /// First instant of the period.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// First instant after the period.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `instant` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

/// One user's credit balance for one billing period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    /// Store-assigned identifier.
    pub id: BalanceId,

    /// Owning user.
    pub user_id: UserId,

    /// Credits left in this period. Only ever decremented, never below zero.
    pub remaining_credits: i64,

    /// Credits granted when the period was opened.
    pub monthly_allowance: i64,

    /// First instant of the period.
    pub period_start: DateTime<Utc>,

    /// First instant after the period.
    pub period_end: DateTime<Utc>,
}

impl CreditBalance {
    /// Assemble a stored balance from a creation request and its assigned ID.
    #[must_use]
    pub fn from_new(id: BalanceId, new: &NewBalance) -> Self {
        Self {
            id,
            user_id: new.user_id.clone(),
            remaining_credits: new.remaining_credits,
            monthly_allowance: new.monthly_allowance,
            period_start: new.period.start(),
            period_end: new.period.end(),
        }
    }

    /// Whether this balance is the active one at `instant`.
    #[must_use]
    pub fn is_active_at(&self, instant: DateTime<Utc>) -> bool {
        self.period_start <= instant && instant < self.period_end
    }

    /// Whether any credits remain.
    #[must_use]
    pub const fn has_credits(&self) -> bool {
        self.remaining_credits > 0
    }

    /// Whether a debit of `cost` would be accepted.
    #[must_use]
    pub const fn can_afford(&self, cost: i64) -> bool {
        self.remaining_credits >= cost
    }

}

/// Input for opening a new balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBalance {
    /// Owning user.
    pub user_id: UserId,
    /// Initial remaining credits.
    pub remaining_credits: i64,
    /// Allowance for the period.
    pub monthly_allowance: i64,
    /// Period covered.
    pub period: BillingPeriod,
}

impl NewBalance {
    /// Create a validated balance request.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidAmount` unless `monthly_allowance > 0`
    /// and `0 <= remaining_credits <= monthly_allowance`.
    pub fn new(
        user_id: UserId,
        remaining_credits: i64,
        monthly_allowance: i64,
        period: BillingPeriod,
    ) -> Result<Self> {
        if monthly_allowance <= 0 {
            return Err(BillingError::InvalidAmount(format!(
                "monthly allowance must be positive, got {monthly_allowance}"
            )));
        }
        if !(0..=monthly_allowance).contains(&remaining_credits) {
            return Err(BillingError::InvalidAmount(format!(
                "remaining credits {remaining_credits} outside 0..={monthly_allowance}"
            )));
        }
        Ok(Self {
            user_id,
            remaining_credits,
            monthly_allowance,
            period,
        })
    }

    /// A fresh period with the full allowance remaining.
    ///
    /// # Errors
    ///
    /// See [`NewBalance::new`].
    pub fn full_allowance(user_id: UserId, allowance: i64, period: BillingPeriod) -> Result<Self> {
        Self::new(user_id, allowance, allowance, period)
    }
}
