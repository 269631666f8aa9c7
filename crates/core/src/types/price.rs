//! Type-safe price representation using decimal arithmetic.
//!
//! Cart and wishlist rows carry the item's selling price for display only;
//! the backend remains authoritative for what is charged at checkout.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(default)]
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

    /// Create a price in the store's default currency.
    #[must_use]
    pub fn from_amount(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::default())
    }

    /// Parse a price from a JSON value sent by the backend.
    ///
    /// Decimal fields arrive as strings (`"199.00"`) or plain numbers; anything
    /// else, including unparseable strings, yields `None`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let amount = match value {
            serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok()?,
            serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok()?,
            _ => return None,
        };
        Some(Self::from_amount(amount))
    }

    /// Price multiplied by a quantity.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_string() {
        let price = Price::from_json(&json!("199.50")).unwrap();
        assert_eq!(price.amount, Decimal::new(19950, 2));
        assert_eq!(price.currency_code, CurrencyCode::INR);
    }

    #[test]
    fn test_from_json_number() {
        let price = Price::from_json(&json!(45)).unwrap();
        assert_eq!(price.amount, Decimal::from(45));

        let price = Price::from_json(&json!(12.5)).unwrap();
        assert_eq!(price.amount, Decimal::new(125, 1));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(Price::from_json(&json!("abc")).is_none());
        assert!(Price::from_json(&json!(null)).is_none());
        assert!(Price::from_json(&json!({"amount": 1})).is_none());
    }

    #[test]
    fn test_display_two_decimals() {
        let price = Price::from_amount(Decimal::new(1234, 1));
        assert_eq!(price.to_string(), "₹123.40");
    }

    #[test]
    fn test_times() {
        let price = Price::from_amount(Decimal::new(1999, 2));
        assert_eq!(price.times(3).amount, Decimal::new(5997, 2));
    }
}
