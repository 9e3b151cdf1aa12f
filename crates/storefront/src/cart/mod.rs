//! Shopping cart: the per-visitor mirror, pricing and server reconciliation.
//!
//! # Architecture
//!
//! - [`Cart`] is a plain value kept in the visitor's session. It is the
//!   storefront's mirror of the backend cart store, which stays authoritative.
//! - [`pricing`] derives subtotal, discount and total from a cart.
//! - [`reconcile`] merges the mirror with the server cart when a visitor signs in.
//! - [`CartService`] ties the three together with the backend client and the
//!   session, pushing every change to the server (with retry) for signed-in users.

pub mod pricing;
pub mod reconcile;
pub mod service;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shopfront_core::{DiscountPercent, ProductId};

use crate::api::ApiError;
use crate::api::types::{OrderItem, Product, ServerCart, ServerCartItem};

pub use pricing::PriceSummary;
pub use service::{CartService, CartUpdate, CouponNotice};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity of zero on an add.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The product is not in the cart.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),

    /// The product has no stock left.
    #[error("{0} is out of stock")]
    OutOfStock(String),

    /// Empty coupon code submitted.
    #[error("enter a coupon code")]
    EmptyCouponCode,

    /// Coupon applied to an empty cart.
    #[error("add something to your cart before applying a coupon")]
    EmptyCart,

    /// The coupon service refused the code.
    #[error("{0}")]
    CouponRejected(String),

    /// Session store failure.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Backend failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartItem {
    /// A line for `quantity` units of `product`.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            image: product.primary_image().map(ToString::to_string),
            unit_price: product.price,
            quantity,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A coupon the coupon service has accepted for this cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    /// Normalised (trimmed, uppercase) code.
    pub code: String,
    pub percent: DiscountPercent,
}

/// The cart mirror.
///
/// Invariants: every line has `quantity >= 1`, and no two lines share a
/// product id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub coupon: Option<AppliedCoupon>,
}

impl Cart {
    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Sum of line totals, before any discount.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Add a line, or add its quantity to the existing line for the product.
    ///
    /// An existing line takes the new name, image and price.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a zero quantity.
    pub fn add(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        match self
            .items
            .iter_mut()
            .find(|line| line.product_id == item.product_id)
        {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(item.quantity);
                line.name = item.name;
                line.image = item.image;
                line.unit_price = item.unit_price;
            }
            None => self.items.push(item),
        }
        Ok(())
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if the product has no line.
    pub fn update_quantity(&mut self, product_id: &ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(product_id);
        }

        let line = self
            .items
            .iter_mut()
            .find(|line| &line.product_id == product_id)
            .ok_or_else(|| CartError::NotInCart(product_id.clone()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if the product has no line.
    pub fn remove(&mut self, product_id: &ProductId) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|line| &line.product_id != product_id);
        if self.items.len() == before {
            return Err(CartError::NotInCart(product_id.clone()));
        }
        Ok(())
    }

    /// Drop every line and the coupon.
    pub fn clear(&mut self) {
        self.items.clear();
        self.coupon = None;
    }

    /// Attach a validated coupon, replacing any previous one.
    pub fn apply_coupon(&mut self, coupon: AppliedCoupon) {
        self.coupon = Some(coupon);
    }

    /// Detach the coupon, returning it.
    pub fn remove_coupon(&mut self) -> Option<AppliedCoupon> {
        self.coupon.take()
    }

    /// Order lines for checkout.
    #[must_use]
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.items
            .iter()
            .map(|item| OrderItem {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                price: item.unit_price,
                quantity: item.quantity,
                image: item.image.clone(),
            })
            .collect()
    }
}

impl From<ServerCart> for Cart {
    /// Lines with a zero quantity are dropped and duplicate product lines are
    /// folded together, so a server cart always yields a valid mirror.
    fn from(server: ServerCart) -> Self {
        let mut cart = Self::default();
        for item in server.items {
            // Zero-quantity lines are rejected by `add`; skip them.
            let _ = cart.add(CartItem {
                product_id: item.product_id,
                name: item.name,
                image: item.image,
                unit_price: item.price,
                quantity: item.quantity,
            });
        }
        cart.coupon = match (server.coupon_code, server.discount_percent) {
            (Some(code), Some(percent)) if !code.trim().is_empty() => Some(AppliedCoupon {
                code: code.trim().to_uppercase(),
                percent,
            }),
            _ => None,
        };
        cart
    }
}

impl From<&Cart> for ServerCart {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart
                .items
                .iter()
                .map(|item| ServerCartItem {
                    product_id: item.product_id.clone(),
                    name: item.name.clone(),
                    price: item.unit_price,
                    image: item.image.clone(),
                    quantity: item.quantity,
                })
                .collect(),
            coupon_code: cart.coupon.as_ref().map(|c| c.code.clone()),
            discount_percent: cart.coupon.as_ref().map(|c| c.percent),
        }
    }
}
