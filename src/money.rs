//! Money
//!
//! Monetary amounts are [`Decimal`] throughout; floats never touch money.
//! Everything customer-facing is rounded to two decimal places, half away
//! from zero.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoneyError {
    #[error("invalid currency code {0:?}")]
    InvalidCurrencyCode(String),
}

/// An ISO 4217 alphabetic currency code, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses and normalizes a currency code.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::InvalidCurrencyCode`] unless the input is
    /// exactly three ASCII letters.
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrencyCode(code.to_string()));
        }

        Ok(Self(code.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::usd()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rounds to two decimal places, midpoint away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Clamps an amount at zero from below.
#[must_use]
pub fn non_negative(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}
