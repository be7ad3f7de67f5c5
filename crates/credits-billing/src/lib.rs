//! Credit metering for paid AI calls.
//!
//! Every user receives a monthly allowance of credits. Before a paid model
//! call the application asks [`BillingService::check_credits`]; afterwards it
//! reports the token usage to [`BillingService::record_usage`], which prices
//! it and debits the active balance atomically.
//!
//! # Periods
//!
//! Balances are scoped to UTC calendar months. The first check or debit in a
//! new month opens a fresh balance with the full allowance; earlier months are
//! kept as history and never modified again.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use credits_billing::BillingService;
//! use credits_core::{UserId, HAIKU_MODEL};
//! use credits_store::MemoryStore;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let billing = BillingService::new(Arc::new(MemoryStore::new()));
//! let user_id = UserId::new("user-1")?;
//!
//! if billing.check_credits(&user_id).await?.has_credits {
//!     let charge = billing.record_usage(&user_id, 100_000, 0, HAIKU_MODEL).await?;
//!     assert_eq!(charge.credit_cost, 800);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod billing;
pub mod clock;
pub mod config;
pub mod error;
pub mod instrument;
pub mod observer;
pub mod period;
pub mod telemetry;

pub use backend::open_store;
pub use billing::{BillingService, CreditCheck, Metered, TokenUsage, UsageCharge};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LedgerConfig, StoreBackend};
pub use error::{LedgerError, Result};
pub use instrument::InstrumentedStore;
pub use observer::{TracingObserver, UsageObserver, UsageRecord};
pub use period::PeriodResolver;
pub use telemetry::init_tracing;
