//! Error types for the credit ledger core.

use chrono::{DateTime, Utc};

use crate::ids::IdError;

/// Result type for core ledger operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors raised while building ledger values or configuration.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A billing period whose start is not before its end.
    #[error("invalid billing period: start={start} is not before end={end}")]
    InvalidPeriod {
        /// Requested period start.
        start: DateTime<Utc>,
        /// Requested period end.
        end: DateTime<Utc>,
    },

    /// Invalid amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}
