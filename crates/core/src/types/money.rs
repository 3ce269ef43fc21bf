//! Prices, currencies and percentage discounts.
//!
//! All arithmetic uses [`Decimal`]; amounts are in the currency's standard
//! unit (dollars, not cents) and rounded to two places half away from zero.

use core::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places kept for money amounts.
pub const MONEY_SCALE: u32 = 2;

/// Round an amount to cents, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an amount to the gateway's minor units (cents).
///
/// Returns `None` when the amount does not fit into an `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    (round_money(amount) * Decimal::ONE_HUNDRED).to_i64()
}

/// ISO 4217 currency codes accepted for product prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    PLN,
}

impl CurrencyCode {
    /// Upper-case ISO code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::PLN => "PLN",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "PLN" => Ok(Self::PLN),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// The price after applying `discount`, if it is active.
    #[must_use]
    pub fn discounted(&self, discount: Option<&Discount>) -> Self {
        Self {
            amount: current_price(self.amount, discount),
            currency_code: self.currency_code,
        }
    }
}

/// A percentage discount attached to products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    /// Display name, e.g. "Summer sale".
    pub name: String,
    /// Percentage off, `0..=100` with two decimal places.
    pub percent: Decimal,
    /// Inactive discounts are shown but never applied.
    pub active: bool,
}

impl Discount {
    /// Whether the discount reduces the price.
    #[must_use]
    pub fn applies(&self) -> bool {
        self.active && self.percent > Decimal::ZERO
    }

    /// Check the percentage is within `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns a message describing the violated bound.
    pub fn validate_percent(percent: Decimal) -> Result<(), String> {
        if percent < Decimal::ZERO {
            return Err("Discount percent cannot be negative.".to_owned());
        }
        if percent > Decimal::ONE_HUNDRED {
            return Err("Discount percent cannot exceed 100.".to_owned());
        }
        Ok(())
    }
}

/// Unit price after an active discount.
///
/// `price * (1 - percent / 100)`, rounded to cents. Inactive or missing
/// discounts leave the price unchanged; the result never goes below zero.
#[must_use]
pub fn current_price(price: Decimal, discount: Option<&Discount>) -> Decimal {
    let Some(discount) = discount.filter(|d| d.applies()) else {
        return round_money(price);
    };
    let percent = discount.percent.min(Decimal::ONE_HUNDRED);
    let factor = Decimal::ONE - percent / Decimal::ONE_HUNDRED;
    round_money(price * factor).max(Decimal::ZERO)
}
