//! Ledger error types.

use credits_core::{BillingError, UserId};
use credits_store::StoreError;

/// Result type for billing operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors surfaced by the billing service.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The active balance cannot cover the cost. Terminal for the request:
    /// the paid action should be denied, not retried.
    #[error("insufficient credits for {user_id}: required={required}")]
    InsufficientCredits {
        /// User whose balance refused the debit.
        user_id: UserId,
        /// Cost that could not be covered.
        required: i64,
    },

    /// The store failed. Propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid values or configuration.
    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl LedgerError {
    /// Whether the caller may retry the same call with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::InsufficientCredits { .. } | Self::Billing(_) => false,
        }
    }

    /// Whether this is the insufficient-credits refusal.
    #[must_use]
    pub const fn is_insufficient_credits(&self) -> bool {
        matches!(self, Self::InsufficientCredits { .. })
    }
}
