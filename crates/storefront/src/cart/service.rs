//! Cart operations over the session mirror and the backend cart store.
//!
//! Every mutation writes the mirror first and then, for a signed-in visitor,
//! pushes the whole cart to the backend under the configured retry policy. A
//! failed push is logged and otherwise ignored: the mirror still holds the
//! change and the next mutation pushes it again.

use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::{DiscountPercent, ProductId};

use crate::api::ApiClient;
use crate::api::retry::RetryPolicy;
use crate::api::types::{Product, ServerCart};
use crate::cart::{AppliedCoupon, Cart, CartError, CartItem, reconcile};
use crate::models::session_keys;

/// A coupon that was dropped after the cart changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponNotice {
    pub code: String,
    pub message: String,
}

/// Result of a cart mutation.
#[derive(Debug, Clone)]
pub struct CartUpdate {
    pub cart: Cart,
    /// Set when the change invalidated the applied coupon.
    pub notice: Option<CouponNotice>,
}

/// Per-request cart operations.
pub struct CartService<'a> {
    api: &'a ApiClient,
    session: &'a Session,
    policy: RetryPolicy,
    token: Option<&'a str>,
}

impl<'a> CartService<'a> {
    /// Operations for an anonymous visitor. Use [`Self::with_token`] for a
    /// signed-in one.
    #[must_use]
    pub const fn new(api: &'a ApiClient, session: &'a Session, policy: RetryPolicy) -> Self {
        Self {
            api,
            session,
            policy,
            token: None,
        }
    }

    /// Mirror every change to the backend cart of the user behind `token`.
    #[must_use]
    pub const fn with_token(mut self, token: Option<&'a str>) -> Self {
        self.token = token;
        self
    }

    /// Read the mirror. A missing or unreadable mirror is an empty cart.
    pub async fn load(&self) -> Cart {
        match self.session.get::<Cart>(session_keys::CART).await {
            Ok(cart) => cart.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable cart mirror");
                Cart::default()
            }
        }
    }

    /// Write the mirror and push the cart to the server for a signed-in user.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session cannot be written.
    pub async fn save(&self, cart: &Cart) -> Result<(), CartError> {
        self.session.insert(session_keys::CART, cart).await?;
        self.push(cart).await;
        Ok(())
    }

    async fn push(&self, cart: &Cart) {
        let Some(token) = self.token else {
            return;
        };
        let server = ServerCart::from(cart);
        if let Err(e) = self
            .api
            .put_server_cart_with_retry(token, &server, self.policy)
            .await
        {
            tracing::warn!(error = %e, "Cart sync failed; keeping local mirror");
        }
    }

    /// Merge the mirror with the server cart after sign-in and save the
    /// result on both sides.
    ///
    /// If the server cart cannot be fetched the mirror is kept as is and
    /// pushed, so nothing the visitor added is lost.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session cannot be written.
    #[instrument(skip(self, token))]
    pub async fn sync_on_login(&self, token: &str) -> Result<CartUpdate, CartError> {
        let local = self.load().await;

        let merged = match self.api.get_server_cart_with_retry(token, self.policy).await {
            Ok(server) => reconcile::merge(local, Cart::from(server)),
            Err(e) => {
                tracing::warn!(error = %e, "Could not fetch server cart at sign-in");
                local
            }
        };

        let service = CartService {
            api: self.api,
            session: self.session,
            policy: self.policy,
            token: Some(token),
        };
        service.commit(merged).await
    }

    /// Add `quantity` units of `product`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::OutOfStock`] or [`CartError::InvalidQuantity`], or
    /// a session error.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_item(&self, product: &Product, quantity: u32) -> Result<CartUpdate, CartError> {
        if !product.in_stock() {
            return Err(CartError::OutOfStock(product.name.clone()));
        }
        let mut cart = self.load().await;
        cart.add(CartItem::from_product(product, quantity))?;
        self.commit(cart).await
    }

    /// Set a line's quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] or a session error.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartUpdate, CartError> {
        let mut cart = self.load().await;
        cart.update_quantity(product_id, quantity)?;
        self.commit(cart).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] or a session error.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, product_id: &ProductId) -> Result<CartUpdate, CartError> {
        let mut cart = self.load().await;
        cart.remove(product_id)?;
        self.commit(cart).await
    }

    /// Empty the cart on both sides.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session cannot be written.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CartError> {
        self.session.insert(session_keys::CART, Cart::default()).await?;
        if let Some(token) = self.token
            && let Err(e) = self.api.clear_server_cart_with_retry(token, self.policy).await
        {
            tracing::warn!(error = %e, "Failed to clear server cart");
        }
        Ok(())
    }

    /// Validate `code` against the current subtotal and attach it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::EmptyCouponCode`], [`CartError::EmptyCart`],
    /// [`CartError::CouponRejected`] with the coupon service's reason, or a
    /// backend or session error.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<Cart, CartError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(CartError::EmptyCouponCode);
        }

        let mut cart = self.load().await;
        if cart.is_empty() {
            return Err(CartError::EmptyCart);
        }

        let verdict = self.api.validate_coupon(&code, cart.subtotal()).await?;
        let percent = match (verdict.valid, verdict.discount_percent) {
            (true, Some(percent)) => percent,
            _ => {
                return Err(CartError::CouponRejected(
                    verdict
                        .message
                        .unwrap_or_else(|| format!("Coupon {code} is not valid")),
                ));
            }
        };

        tracing::info!(code = %code, percent = %percent, "Coupon applied");
        cart.apply_coupon(AppliedCoupon { code, percent });
        self.save(&cart).await?;
        Ok(cart)
    }

    /// Detach the coupon.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session cannot be written.
    #[instrument(skip(self))]
    pub async fn remove_coupon(&self) -> Result<Cart, CartError> {
        let mut cart = self.load().await;
        if cart.remove_coupon().is_some() {
            self.save(&cart).await?;
        }
        Ok(cart)
    }

    /// Re-check the applied coupon against `cart`.
    ///
    /// The coupon is dropped when the cart is empty or the coupon service no
    /// longer accepts it; a changed percentage is taken over. If the coupon
    /// service cannot be reached the coupon is kept.
    pub async fn revalidate_coupon(&self, cart: &mut Cart) -> Option<CouponNotice> {
        let coupon = cart.coupon.as_ref()?;
        let code = coupon.code.clone();

        if cart.is_empty() {
            cart.remove_coupon();
            return Some(CouponNotice {
                message: format!("Coupon {code} was removed because your cart is empty."),
                code,
            });
        }

        match self.api.validate_coupon(&code, cart.subtotal()).await {
            Ok(verdict) => match (verdict.valid, verdict.discount_percent) {
                (true, Some(percent)) => {
                    set_percent(cart, percent);
                    None
                }
                _ => {
                    cart.remove_coupon();
                    tracing::info!(code = %code, "Coupon no longer valid; removed");
                    Some(CouponNotice {
                        message: verdict.message.unwrap_or_else(|| {
                            format!("Coupon {code} no longer applies to your cart.")
                        }),
                        code,
                    })
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, code = %code, "Coupon revalidation failed; keeping coupon");
                None
            }
        }
    }

    /// Revalidate the coupon, then save.
    async fn commit(&self, mut cart: Cart) -> Result<CartUpdate, CartError> {
        let notice = self.revalidate_coupon(&mut cart).await;
        self.save(&cart).await?;
        Ok(CartUpdate { cart, notice })
    }
}

fn set_percent(cart: &mut Cart, percent: DiscountPercent) {
    if let Some(coupon) = cart.coupon.as_mut() {
        coupon.percent = percent;
    }
}

/// Trim and uppercase a coupon code.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
