//! Cart totals.
//!
//! Discount = subtotal x percent / 100, rounded half away from zero to the
//! currency's smallest unit. Total = subtotal - discount, never below zero.

use shopfront_core::{CurrencyCode, DiscountPercent, Price};

use crate::cart::Cart;

/// Derived totals for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSummary {
    pub subtotal: Price,
    pub discount_percent: DiscountPercent,
    pub discount: Price,
    pub total: Price,
    pub item_count: u32,
}

impl PriceSummary {
    /// Compute the totals for `cart` in `currency`.
    #[must_use]
    pub fn compute(cart: &Cart, currency: CurrencyCode) -> Self {
        let subtotal = Price::new(cart.subtotal(), currency).rounded();
        let discount_percent = cart
            .coupon
            .as_ref()
            .map_or(DiscountPercent::ZERO, |coupon| coupon.percent);
        let discount = discount_percent.discount_on(subtotal);
        let total = subtotal.saturating_sub(discount.amount);

        Self {
            subtotal,
            discount_percent,
            discount,
            total,
            item_count: cart.item_count(),
        }
    }

    /// Whether a discount is being applied.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        !self.discount.amount.is_zero()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::AppliedCoupon;
    use crate::cart::tests::item;

    fn coupon(percent: i64) -> AppliedCoupon {
        AppliedCoupon {
            code: "SALE".to_string(),
            percent: DiscountPercent::new(Decimal::from(percent)).unwrap(),
        }
    }

    #[test]
    fn test_ten_percent_off_one_hundred_thousand_dong() {
        let mut cart = Cart::default();
        cart.add(item("p1", 100_000, 1)).unwrap();
        cart.apply_coupon(coupon(10));

        let summary = PriceSummary::compute(&cart, CurrencyCode::VND);
        assert_eq!(summary.subtotal.amount, Decimal::from(100_000));
        assert_eq!(summary.discount.amount, Decimal::from(10_000));
        assert_eq!(summary.total.amount, Decimal::from(90_000));
        assert_eq!(summary.total.display(), "90.000₫");
        assert!(summary.has_discount());
    }

    #[test]
    fn test_no_coupon_means_no_discount() {
        let mut cart = Cart::default();
        cart.add(item("p1", 25_000, 2)).unwrap();

        let summary = PriceSummary::compute(&cart, CurrencyCode::VND);
        assert_eq!(summary.total.amount, Decimal::from(50_000));
        assert!(!summary.has_discount());
        assert_eq!(summary.item_count, 2);
    }

    #[test]
    fn test_discount_rounds_half_away_from_zero() {
        let mut cart = Cart::default();
        cart.add(item("p1", 15, 1)).unwrap();
        cart.apply_coupon(coupon(10));

        // 1.5 rounds to 2
        let summary = PriceSummary::compute(&cart, CurrencyCode::VND);
        assert_eq!(summary.discount.amount, Decimal::from(2));
        assert_eq!(summary.total.amount, Decimal::from(13));
    }

    #[test]
    fn test_full_discount_floors_at_zero() {
        let mut cart = Cart::default();
        cart.add(item("p1", 40_000, 3)).unwrap();
        cart.apply_coupon(coupon(100));

        let summary = PriceSummary::compute(&cart, CurrencyCode::VND);
        assert_eq!(summary.total.amount, Decimal::ZERO);
    }

    #[test]
    fn test_empty_cart() {
        let summary = PriceSummary::compute(&Cart::default(), CurrencyCode::VND);
        assert_eq!(summary.subtotal.amount, Decimal::ZERO);
        assert_eq!(summary.total.amount, Decimal::ZERO);
        assert_eq!(summary.item_count, 0);
    }
}
