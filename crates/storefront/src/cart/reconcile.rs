//! Merging the session cart mirror with the server cart at sign-in.
//!
//! Rules:
//! - lines are unioned by product id, server lines first;
//! - a product present on both sides keeps the larger quantity (the mirror is
//!   a copy of the same cart, so summing would double-count);
//! - name, image and price come from the server line;
//! - the server coupon wins, otherwise the local one is kept.

use crate::cart::Cart;

/// Merge `local` (the session mirror) with `server` (the backend cart).
#[must_use]
pub fn merge(local: Cart, server: Cart) -> Cart {
    let Cart {
        items: local_items,
        coupon: local_coupon,
    } = local;
    let Cart {
        items: mut merged,
        coupon: server_coupon,
    } = server;

    for local_item in local_items {
        match merged
            .iter_mut()
            .find(|line| line.product_id == local_item.product_id)
        {
            Some(line) => line.quantity = line.quantity.max(local_item.quantity),
            None => merged.push(local_item),
        }
    }

    Cart {
        items: merged,
        coupon: server_coupon.or(local_coupon),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use shopfront_core::{DiscountPercent, ProductId};

    use super::*;
    use crate::cart::AppliedCoupon;
    use crate::cart::tests::item;

    fn cart(items: &[(&str, i64, u32)]) -> Cart {
        let mut cart = Cart::default();
        for &(id, price, qty) in items {
            cart.add(item(id, price, qty)).unwrap();
        }
        cart
    }

    fn coupon(code: &str, percent: i64) -> AppliedCoupon {
        AppliedCoupon {
            code: code.to_string(),
            percent: DiscountPercent::new(Decimal::from(percent)).unwrap(),
        }
    }

    #[test]
    fn test_union_keeps_lines_from_both_sides() {
        let merged = merge(cart(&[("a", 10, 1)]), cart(&[("b", 20, 2)]));
        let ids: Vec<_> = merged.items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_shared_product_takes_larger_quantity_and_server_metadata() {
        let mut local = cart(&[("a", 10, 5)]);
        local.items[0].name = "Stale name".to_string();
        let server = cart(&[("a", 12, 2)]);

        let merged = merge(local, server);
        assert_eq!(merged.items.len(), 1);
        let line = merged.line(&ProductId::new("a")).unwrap();
        assert_eq!(line.quantity, 5);
        assert_eq!(line.unit_price, Decimal::from(12));
        assert_eq!(line.name, "Product a");
    }

    #[test]
    fn test_merge_is_idempotent_for_identical_carts() {
        let local = cart(&[("a", 10, 2), ("b", 5, 1)]);
        let merged = merge(local.clone(), local.clone());
        assert_eq!(merged.item_count(), local.item_count());
    }

    #[test]
    fn test_server_coupon_wins() {
        let mut local = cart(&[("a", 10, 1)]);
        local.apply_coupon(coupon("LOCAL5", 5));
        let mut server = cart(&[]);
        server.apply_coupon(coupon("SERVER10", 10));

        assert_eq!(merge(local, server).coupon.unwrap().code, "SERVER10");
    }

    #[test]
    fn test_local_coupon_kept_when_server_has_none() {
        let mut local = cart(&[("a", 10, 1)]);
        local.apply_coupon(coupon("LOCAL5", 5));

        assert_eq!(merge(local, cart(&[])).coupon.unwrap().code, "LOCAL5");
    }
}
