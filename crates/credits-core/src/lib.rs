//! Core types and pricing for the credit ledger.
//!
//! This crate provides the foundational types used throughout the ledger:
//!
//! - **Identifiers**: `UserId`, `BalanceId`
//! - **Balances**: `CreditBalance`, `NewBalance`, `BillingPeriod`
//! - **Pricing**: `PricingTable`, `ModelRate`
//!
//! # Credit Unit
//!
//! **10,000 credits = $1 of model spend**
//!
//! - 1M Sonnet input tokens cost $3 → 30,000 credits
//! - Costs are rounded up to the next whole credit
//! - Stored as `i64` to keep every balance operation exact

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod balance;
pub mod error;
pub mod ids;
pub mod pricing;

pub use balance::{BillingPeriod, CreditBalance, NewBalance, DEFAULT_MONTHLY_ALLOWANCE};
pub use error::{BillingError, Result};
pub use ids::{BalanceId, IdError, UserId};
pub use pricing::{
    tokens_to_credit_cost, ModelRate, PricingTable, CREDITS_PER_DOLLAR, HAIKU_MODEL, SONNET_MODEL,
};
