//! Currency-tagged decimal amounts
//!
//! Payment amounts are carried as exact decimals tagged with their ISO 4217
//! currency code. Arithmetic is only defined between amounts of the same
//! currency and never produces a negative value.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors raised by price arithmetic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
    #[error("amount would become negative: {amount} - {subtracted}")]
    NegativeAmount { amount: String, subtracted: String },
}

/// A monetary amount in a single currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    amount: Decimal,
    currency: String,
}

impl Price {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_uppercase(),
        }
    }

    pub fn zero(currency: &str) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Number of minor-unit digits for a currency code.
    ///
    /// Three-decimal and zero-decimal currencies are enumerated explicitly;
    /// everything else uses the common two decimals.
    pub fn minor_unit_digits(currency: &str) -> u32 {
        match currency {
            "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
            "JPY" | "KRW" | "VND" => 0,
            _ => 2,
        }
    }

    /// Round the amount to the currency's minor-unit precision.
    pub fn rounded(&self) -> Price {
        let digits = Self::minor_unit_digits(&self.currency);
        Self {
            amount: self.amount.round_dp(digits),
            currency: self.currency.clone(),
        }
    }

    pub fn checked_add(&self, other: &Price) -> Result<Price, MoneyError> {
        self.assert_same_currency(other)?;
        Ok(Self {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
        })
    }

    pub fn checked_sub(&self, other: &Price) -> Result<Price, MoneyError> {
        self.assert_same_currency(other)?;
        if other.amount > self.amount {
            return Err(MoneyError::NegativeAmount {
                amount: self.to_string(),
                subtracted: other.to_string(),
            });
        }
        Ok(Self {
            amount: self.amount - other.amount,
            currency: self.currency.clone(),
        })
    }

    pub fn cmp_checked(&self, other: &Price) -> Result<Ordering, MoneyError> {
        self.assert_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    pub fn exceeds(&self, other: &Price) -> Result<bool, MoneyError> {
        Ok(self.cmp_checked(other)? == Ordering::Greater)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    fn assert_same_currency(&self, other: &Price) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
