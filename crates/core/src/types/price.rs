//! Type-safe money representation using decimal arithmetic.
//!
//! All storefront amounts (prices, discounts, shipping fees, totals) are
//! `Decimal` values in the currency's standard unit (cedis, naira, dollars).
//! The payment gateway expects minor units (pesewas, kobo, cents), which
//! [`Money::to_minor_units`] produces.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round a monetary amount to two decimal places, midpoint away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// An amount with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., cedis, not pesewas).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Amount in minor units (e.g., pesewas), rounded to the nearest unit.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;

        (round_money(self.amount) * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
    }

    /// Build an amount from minor units.
    #[must_use]
    pub fn from_minor_units(minor: i64, currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(minor, 2),
            currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency.symbol(), round_money(self.amount))
    }
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    /// Ghanaian cedi.
    #[default]
    GHS,
    /// Nigerian naira.
    NGN,
    /// US dollar.
    USD,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::GHS => "GH₵",
            Self::NGN => "₦",
            Self::USD => "$",
        }
    }

    /// Three-letter code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::GHS => "GHS",
            Self::NGN => "NGN",
            Self::USD => "USD",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GHS" => Ok(Self::GHS),
            "NGN" => Ok(Self::NGN),
            "USD" => Ok(Self::USD),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_round_money_midpoint_away_from_zero() {
        assert_eq!(round_money(Decimal::from_str("2.345").unwrap()), Decimal::from_str("2.35").unwrap());
        assert_eq!(round_money(Decimal::from_str("2.344").unwrap()), Decimal::from_str("2.34").unwrap());
    }

    #[test]
    fn test_to_minor_units() {
        let money = Money::new(Decimal::from_str("450.50").unwrap(), CurrencyCode::GHS);
        assert_eq!(money.to_minor_units(), Some(45050));
    }

    #[test]
    fn test_from_minor_units() {
        let money = Money::from_minor_units(12_345, CurrencyCode::NGN);
        assert_eq!(money.amount, Decimal::from_str("123.45").unwrap());
    }

    #[test]
    fn test_display() {
        let money = Money::new(Decimal::from(50), CurrencyCode::GHS);
        assert_eq!(money.to_string(), "GH₵50.00");
    }

    #[test]
    fn test_currency_from_str_is_case_insensitive() {
        assert_eq!(CurrencyCode::from_str("ghs").unwrap(), CurrencyCode::GHS);
        assert!(CurrencyCode::from_str("EUR").is_err());
    }
}
