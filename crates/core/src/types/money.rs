//! Money helpers built on decimal arithmetic.
//!
//! Prices and totals are carried as `rust_decimal::Decimal` in the currency's
//! standard unit (rupees, dollars). Payment gateways want integer minor units
//! (paise, cents), which is what [`to_minor_units`] produces.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors converting between decimal amounts and minor units.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount is negative.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// Amount does not fit in an `i64` of minor units.
    #[error("amount is too large: {0}")]
    Overflow(Decimal),
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// The ISO code as sent to the payment gateway.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    /// Number of minor units per standard unit.
    #[must_use]
    pub const fn minor_unit_factor(self) -> i64 {
        100
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// Convert a decimal amount into integer minor units.
///
/// Fractions of a minor unit are rounded half away from zero, so `15.995`
/// becomes `1600`.
///
/// # Errors
///
/// Returns [`MoneyError::Negative`] for negative amounts and
/// [`MoneyError::Overflow`] if the result does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal, currency: CurrencyCode) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }

    let scaled = amount
        .checked_mul(Decimal::from(currency.minor_unit_factor()))
        .ok_or(MoneyError::Overflow(amount))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    i64::try_from(scaled).map_err(|_| MoneyError::Overflow(amount))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_minor_units_whole_and_fractional() {
        assert_eq!(
            to_minor_units(Decimal::from_str("20.00").unwrap(), CurrencyCode::INR),
            Ok(2000)
        );
        assert_eq!(
            to_minor_units(Decimal::from_str("15.99").unwrap(), CurrencyCode::INR),
            Ok(1599)
        );
        assert_eq!(
            to_minor_units(Decimal::from_str("15.995").unwrap(), CurrencyCode::INR),
            Ok(1600)
        );
    }

    #[test]
    fn test_minor_units_negative() {
        let amount = Decimal::from_str("-1.00").unwrap();
        assert_eq!(
            to_minor_units(amount, CurrencyCode::USD),
            Err(MoneyError::Negative(amount))
        );
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("inr".parse::<CurrencyCode>(), Ok(CurrencyCode::INR));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
