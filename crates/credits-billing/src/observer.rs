//! Post-commit usage notifications.
//!
//! Observers run after a debit has been committed. They cannot fail the
//! charge and must not block; anything slow belongs on a spawned task.

use chrono::{DateTime, Utc};

use credits_core::{BalanceId, UserId};

/// A successfully debited usage report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    /// User who was charged.
    pub user_id: UserId,
    /// Balance the credits came from.
    pub balance_id: BalanceId,
    /// Model identifier as reported by the caller.
    pub model: String,
    /// Input tokens billed.
    pub input_tokens: u64,
    /// Output tokens billed.
    pub output_tokens: u64,
    /// Credits deducted.
    pub credit_cost: i64,
    /// Balance after the deduction.
    pub remaining_credits: i64,
    /// When the debit was committed.
    pub recorded_at: DateTime<Utc>,
}

/// Receives a notification for every committed debit.
pub trait UsageObserver: Send + Sync {
    /// Called once per committed debit.
    fn usage_recorded(&self, record: &UsageRecord);
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl UsageObserver for TracingObserver {
    fn usage_recorded(&self, record: &UsageRecord) {
        tracing::info!(
            target: "credits::usage",
            user_id = %record.user_id,
            balance_id = %record.balance_id,
            model = %record.model,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            cost = record.credit_cost,
            remaining = record.remaining_credits,
            "usage_recorded"
        );
    }
}
