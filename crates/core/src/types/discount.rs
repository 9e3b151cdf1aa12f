//! Percentage discount granted by a coupon.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::price::{CurrencyCode, Price};

/// Errors that can occur when constructing a [`DiscountPercent`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountError {
    /// Percentage below 0 or above 100.
    #[error("discount must be between 0 and 100 percent (got {0})")]
    OutOfRange(Decimal),
}

/// A discount percentage in the inclusive range `0..=100`.
///
/// ```
/// use rust_decimal::Decimal;
/// use shopfront_core::{CurrencyCode, DiscountPercent, Price};
///
/// let ten = DiscountPercent::new(Decimal::from(10)).unwrap();
/// let subtotal = Price::new(Decimal::from(100_000), CurrencyCode::VND);
/// assert_eq!(ten.discount_on(subtotal).amount, Decimal::from(10_000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    /// No discount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a validated percentage.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::OutOfRange`] outside `0..=100`.
    pub fn new(value: Decimal) -> Result<Self, DiscountError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(DiscountError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// The raw percentage value.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Whether this grants no discount at all.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Discount amount on `subtotal`, rounded to the currency's smallest unit.
    #[must_use]
    pub fn discount_on(self, subtotal: Price) -> Price {
        let raw = subtotal.amount * self.0 / Decimal::ONE_HUNDRED;
        let currency: CurrencyCode = subtotal.currency_code;
        Price::new(currency.round(raw), currency)
    }
}

impl TryFrom<Decimal> for DiscountPercent {
    type Error = DiscountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiscountPercent> for Decimal {
    fn from(value: DiscountPercent) -> Self {
        value.0
    }
}

impl std::fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pct(value: i64) -> DiscountPercent {
        DiscountPercent::new(Decimal::from(value)).unwrap()
    }

    #[test]
    fn test_range_validation() {
        assert!(DiscountPercent::new(Decimal::from(-1)).is_err());
        assert!(DiscountPercent::new(Decimal::from(101)).is_err());
        assert!(DiscountPercent::new(Decimal::ZERO).is_ok());
        assert!(DiscountPercent::new(Decimal::ONE_HUNDRED).is_ok());
    }

    #[test]
    fn test_discount_rounds_half_away_from_zero() {
        let subtotal = Price::new(Decimal::from(99_995), CurrencyCode::VND);
        // 15% of 99.995 = 14.999,25 -> 14.999
        assert_eq!(pct(15).discount_on(subtotal).amount, Decimal::from(14_999));
        // 10% of 12.345 = 1.234,5 -> 1.235
        let subtotal = Price::new(Decimal::from(12_345), CurrencyCode::VND);
        assert_eq!(pct(10).discount_on(subtotal).amount, Decimal::from(1_235));
    }

    #[test]
    fn test_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<DiscountPercent>("150").is_err());
        let ok: DiscountPercent = serde_json::from_str("12.5").unwrap();
        assert_eq!(ok.value(), Decimal::new(125, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(pct(10).to_string(), "10%");
        assert_eq!(
            DiscountPercent::new(Decimal::new(125, 1)).unwrap().to_string(),
            "12.5%"
        );
    }
}
