//! Token pricing.
//!
//! Converts model token usage into an integer credit cost. All arithmetic is
//! integer: rates are stored as credits per million tokens and the total is
//! rounded up, so a non-zero usage never bills as zero.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BillingError, Result};

/// Credits charged per US dollar of model spend.
pub const CREDITS_PER_DOLLAR: i64 = 10_000;

/// Token count the per-million rates are expressed against.
pub const TOKENS_PER_RATE_UNIT: u128 = 1_000_000;

/// Claude Sonnet 4 model identifier.
pub const SONNET_MODEL: &str = "claude-sonnet-4-20250514";

/// Claude Haiku 3.5 model identifier.
pub const HAIKU_MODEL: &str = "claude-haiku-3-5-20241022";

/// Credits per cent, derived from [`CREDITS_PER_DOLLAR`].
const CREDITS_PER_CENT: i64 = CREDITS_PER_DOLLAR / 100;

/// Pricing for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRate {
    /// Credits per 1 million input tokens.
    pub input_credits_per_million: i64,
    /// Credits per 1 million output tokens.
    pub output_credits_per_million: i64,
}

impl ModelRate {
    /// Build a rate from US cents per million tokens ($0.80 = 80).
    #[must_use]
    pub const fn from_cents_per_million(input_cents: i64, output_cents: i64) -> Self {
        Self {
            input_credits_per_million: input_cents * CREDITS_PER_CENT,
            output_credits_per_million: output_cents * CREDITS_PER_CENT,
        }
    }

    /// Cost in credits for the given usage, rounded up.
    #[must_use]
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> i64 {
        let micro_total = u128::from(input_tokens) * rate_u128(self.input_credits_per_million)
            + u128::from(output_tokens) * rate_u128(self.output_credits_per_million);
        let credits = micro_total.div_ceil(TOKENS_PER_RATE_UNIT);
        i64::try_from(credits).unwrap_or(i64::MAX)
    }

    fn validate(&self, model: &str) -> Result<()> {
        if self.input_credits_per_million <= 0 || self.output_credits_per_million <= 0 {
            return Err(BillingError::Configuration(format!(
                "pricing for {model} must have positive input and output rates"
            )));
        }
        Ok(())
    }
}

fn rate_u128(rate: i64) -> u128 {
    u128::try_from(rate).unwrap_or(0)
}

/// Sonnet: $3.00 per 1M input, $15.00 per 1M output.
const SONNET_RATE: ModelRate = ModelRate::from_cents_per_million(300, 1500);

/// Haiku: $0.80 per 1M input, $4.00 per 1M output.
const HAIKU_RATE: ModelRate = ModelRate::from_cents_per_million(80, 400);

/// Per-model price table with a fallback tier for unrecognized models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTable {
    /// Rates keyed by the model identifier reported upstream.
    pub models: HashMap<String, ModelRate>,

    /// Rate applied to any model not in `models`.
    pub default_rate: ModelRate,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(SONNET_MODEL.to_string(), SONNET_RATE);
        models.insert(HAIKU_MODEL.to_string(), HAIKU_RATE);

        Self {
            models,
            // Unknown models bill at the most expensive tier.
            default_rate: SONNET_RATE,
        }
    }
}

impl PricingTable {
    /// Parse a table from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Configuration` if the JSON is malformed or a
    /// rate is not positive.
    pub fn from_json(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)
            .map_err(|e| BillingError::Configuration(format!("invalid pricing table: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    /// Check that every rate is strictly positive.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Configuration` naming the first offending model.
    pub fn validate(&self) -> Result<()> {
        self.default_rate.validate("the default tier")?;
        for (model, rate) in &self.models {
            rate.validate(model)?;
        }
        Ok(())
    }

    /// The rate billed for `model`, falling back to the default tier.
    #[must_use]
    pub fn rate_for(&self, model: &str) -> &ModelRate {
        self.models.get(model).unwrap_or(&self.default_rate)
    }

    /// Whether `model` has its own entry.
    #[must_use]
    pub fn is_known(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    /// Cost in credits of `input_tokens` and `output_tokens` on `model`.
    #[must_use]
    pub fn cost(&self, input_tokens: u64, output_tokens: u64, model: &str) -> i64 {
        self.rate_for(model).cost(input_tokens, output_tokens)
    }
}

/// Cost under the built-in price table, for one-off estimates.
#[must_use]
pub fn tokens_to_credit_cost(input_tokens: u64, output_tokens: u64, model: &str) -> i64 {
    PricingTable::default().cost(input_tokens, output_tokens, model)
}
