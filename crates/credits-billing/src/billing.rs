//! Billing service.
//!
//! The two operations the rest of the application calls:
//!
//! - [`BillingService::check_credits`]: may the user start a paid action?
//! - [`BillingService::record_usage`]: price the tokens and debit the balance.
//!
//! Plus [`BillingService::run_metered`], which wraps a paid action in both.

use std::future::Future;
use std::sync::Arc;

use credits_core::{CreditBalance, PricingTable, UserId};
use credits_store::{DebitOutcome, LedgerStore};

use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::observer::{UsageObserver, UsageRecord};
use crate::period::PeriodResolver;

/// Answer to "may this user spend?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditCheck {
    /// Whether any credits remain in the active period.
    pub has_credits: bool,
    /// Credits remaining in the active period.
    pub remaining_credits: i64,
}

/// Outcome of a successful usage debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCharge {
    /// Credits deducted.
    pub credit_cost: i64,
    /// Credits remaining after the deduction.
    pub remaining_credits: i64,
}

/// Token consumption reported by a model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
    /// Model identifier as reported by the provider.
    pub model: String,
}

impl TokenUsage {
    /// Create a usage report.
    #[must_use]
    pub fn new(input_tokens: u64, output_tokens: u64, model: impl Into<String>) -> Self {
        Self {
            input_tokens,
            output_tokens,
            model: model.into(),
        }
    }
}

/// A paid action's result together with the tokens it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metered<T> {
    /// What the action produced.
    pub value: T,
    /// Tokens to bill for it.
    pub usage: TokenUsage,
}

/// Orchestrates period resolution, pricing and debits.
#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn LedgerStore>,
    resolver: PeriodResolver,
    pricing: PricingTable,
    observers: Vec<Arc<dyn UsageObserver>>,
}

impl BillingService {
    /// Service over `store` with the default allowance, the built-in price
    /// table and the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            resolver: PeriodResolver::new(Arc::clone(&store)),
            store,
            pricing: PricingTable::default(),
            observers: Vec::new(),
        }
    }

    /// Service over `store` with the allowance and pricing from `config`.
    #[must_use]
    pub fn from_config(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Self {
        Self::new(store)
            .with_monthly_allowance(config.monthly_allowance)
            .with_pricing(config.pricing.clone())
    }

    /// Use a different time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.resolver = self.resolver.with_clock(clock);
        self
    }

    /// Grant `allowance` credits to newly opened periods.
    #[must_use]
    pub fn with_monthly_allowance(mut self, allowance: i64) -> Self {
        self.resolver = self.resolver.with_monthly_allowance(allowance);
        self
    }

    /// Price usage with `pricing`.
    #[must_use]
    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    /// Notify `observer` after every committed debit.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn UsageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// The period resolver used by this service.
    #[must_use]
    pub fn resolver(&self) -> &PeriodResolver {
        &self.resolver
    }

    /// The price table used by this service.
    #[must_use]
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Report whether the user has credits left, opening the current period
    /// if needed.
    ///
    /// A user with no prior activity gets the full allowance.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store fails.
    pub async fn check_credits(&self, user_id: &UserId) -> Result<CreditCheck> {
        let balance = self.resolver.ensure_active_period(user_id).await?;

        Ok(CreditCheck {
            has_credits: balance.has_credits(),
            remaining_credits: balance.remaining_credits,
        })
    }

    /// Price the given usage and debit it from the active balance.
    ///
    /// The debit is all-or-nothing: if the balance cannot cover the cost,
    /// nothing is deducted and `LedgerError::InsufficientCredits` is returned.
    /// Unknown models are billed at the default tier.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InsufficientCredits` if the cost exceeds the balance.
    /// - `LedgerError::Store` if the store fails.
    pub async fn record_usage(
        &self,
        user_id: &UserId,
        input_tokens: u64,
        output_tokens: u64,
        model: &str,
    ) -> Result<UsageCharge> {
        let balance = self.resolver.ensure_active_period(user_id).await?;
        let credit_cost = self.pricing.cost(input_tokens, output_tokens, model);

        if !self.pricing.is_known(model) {
            tracing::debug!(model = %model, "Unknown model, billing at default tier");
        }

        match self.store.try_debit(balance.id, credit_cost).await? {
            DebitOutcome::Debited { remaining_credits } => {
                tracing::info!(
                    user_id = %user_id,
                    balance_id = %balance.id,
                    model = %model,
                    input_tokens,
                    output_tokens,
                    cost = credit_cost,
                    remaining = remaining_credits,
                    "Usage recorded"
                );

                self.notify(&UsageRecord {
                    user_id: user_id.clone(),
                    balance_id: balance.id,
                    model: model.to_string(),
                    input_tokens,
                    output_tokens,
                    credit_cost,
                    remaining_credits,
                    recorded_at: self.resolver.now(),
                });

                Ok(UsageCharge {
                    credit_cost,
                    remaining_credits,
                })
            }
            DebitOutcome::Refused => {
                tracing::warn!(
                    user_id = %user_id,
                    balance_id = %balance.id,
                    cost = credit_cost,
                    "Debit refused: insufficient credits"
                );
                Err(LedgerError::InsufficientCredits {
                    user_id: user_id.clone(),
                    required: credit_cost,
                })
            }
        }
    }

    /// Cost of the given usage without touching any balance.
    #[must_use]
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64, model: &str) -> i64 {
        self.pricing.cost(input_tokens, output_tokens, model)
    }

    /// The user's balance for the current period, opening it if needed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store fails.
    pub async fn active_balance(&self, user_id: &UserId) -> Result<CreditBalance> {
        self.resolver.ensure_active_period(user_id).await
    }

    /// Every period balance for the user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store fails.
    pub async fn balance_history(&self, user_id: &UserId) -> Result<Vec<CreditBalance>> {
        Ok(self.store.list_balances(user_id).await?)
    }

    /// Run a paid action behind a credit check and bill what it used.
    ///
    /// Returns `Ok(None)` without running `action` when the user has no
    /// credits left. Once `action` has produced a value, recording its usage
    /// is best-effort: a failed debit is logged and the value is still
    /// returned, since the work has already been delivered.
    ///
    /// # Errors
    ///
    /// Returns the credit check's error (converted into `E`) or the action's
    /// own error. Usage-recording errors are never returned.
    pub async fn run_metered<T, E, F, Fut>(
        &self,
        user_id: &UserId,
        action: F,
    ) -> std::result::Result<Option<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Metered<T>, E>>,
        E: From<LedgerError>,
    {
        let check = self.check_credits(user_id).await?;
        if !check.has_credits {
            tracing::info!(user_id = %user_id, "Paid action skipped: no credits left");
            return Ok(None);
        }

        let Metered { value, usage } = action().await?;

        if let Err(err) = self
            .record_usage(user_id, usage.input_tokens, usage.output_tokens, &usage.model)
            .await
        {
            tracing::error!(
                user_id = %user_id,
                model = %usage.model,
                error = %err,
                "Failed to record credit usage"
            );
        }

        Ok(Some(value))
    }

    fn notify(&self, record: &UsageRecord) {
        for observer in &self.observers {
            observer.usage_recorded(record);
        }
    }
}
