//! Checkout: validate the delivery form, price the cart and place the order.

use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use shopfront_core::{PaymentMethod, PhoneNumber};

use crate::api::types::{CreateOrderRequest, Order, Recipient};
use crate::api::{ApiClient, ApiError};
use crate::cart::{Cart, CartError, CartService, PriceSummary};
use crate::error::capitalize;

const MAX_NAME_LEN: usize = 100;
const MAX_ADDRESS_LEN: usize = 300;
const MAX_NOTE_LEN: usize = 500;

/// A problem with one checkout form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines.
    #[error("your cart is empty")]
    EmptyCart,

    /// One or more form fields are invalid.
    #[error("please correct the highlighted fields")]
    Invalid(Vec<FieldError>),

    /// The order service refused or failed the order.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Cart mirror failure.
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// Checkout form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub payment_method: String,
}

/// A checkout form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCheckout {
    pub recipient: Recipient,
    pub payment_method: PaymentMethod,
}

impl CheckoutForm {
    /// Validate every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Invalid`] listing each bad field.
    pub fn validate(&self) -> Result<ValidCheckout, CheckoutError> {
        let mut errors = Vec::new();
        let mut fail = |field: &'static str, message: String| {
            errors.push(FieldError { field, message });
        };

        let name = self.name.trim();
        if name.is_empty() {
            fail("name", "Enter the recipient's name".to_string());
        } else if name.chars().count() > MAX_NAME_LEN {
            fail("name", format!("Name must be at most {MAX_NAME_LEN} characters"));
        }

        let phone = match PhoneNumber::parse(&self.phone) {
            Ok(phone) => Some(phone),
            Err(e) => {
                fail("phone", capitalize(&e.to_string()));
                None
            }
        };

        let address = self.address.trim();
        if address.is_empty() {
            fail("address", "Enter a delivery address".to_string());
        } else if address.chars().count() > MAX_ADDRESS_LEN {
            fail(
                "address",
                format!("Address must be at most {MAX_ADDRESS_LEN} characters"),
            );
        }

        let note = self
            .note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty());
        if note.is_some_and(|note| note.chars().count() > MAX_NOTE_LEN) {
            fail("note", format!("Note must be at most {MAX_NOTE_LEN} characters"));
        }

        let method = self.payment_method.trim();
        let payment_method = if method.is_empty() {
            Some(PaymentMethod::default())
        } else {
            method.parse::<PaymentMethod>().ok().or_else(|| {
                fail("payment_method", "Choose a payment method".to_string());
                None
            })
        };

        match (phone, payment_method) {
            (Some(phone), Some(payment_method)) if errors.is_empty() => Ok(ValidCheckout {
                recipient: Recipient {
                    name: name.to_string(),
                    phone: phone.as_str().to_string(),
                    address: address.to_string(),
                    note: note.map(ToString::to_string),
                },
                payment_method,
            }),
            _ => Err(CheckoutError::Invalid(errors)),
        }
    }
}


/// Build the order request for `cart`.
#[must_use]
pub fn build_order_request(
    cart: &Cart,
    summary: &PriceSummary,
    checkout: ValidCheckout,
) -> CreateOrderRequest {
    CreateOrderRequest {
        recipient: checkout.recipient,
        items: cart.order_items(),
        payment_method: checkout.payment_method,
        coupon_code: cart.coupon.as_ref().map(|coupon| coupon.code.clone()),
        subtotal: summary.subtotal.amount,
        discount: summary.discount.amount,
        total: summary.total.amount,
    }
}

/// Place an order for the cart held by `carts`.
///
/// The coupon is revalidated first, so a coupon that expired while the visitor
/// was filling in the form is not sent. On success the cart is cleared on both
/// sides.
///
/// # Errors
///
/// Returns [`CheckoutError::Invalid`] for a bad form,
/// [`CheckoutError::EmptyCart`] for an empty cart, or the order service's
/// error.
#[instrument(skip(api, carts, token, form))]
pub async fn place_order(
    api: &ApiClient,
    carts: &CartService<'_>,
    token: Option<&str>,
    form: &CheckoutForm,
) -> Result<Order, CheckoutError> {
    let checkout = form.validate()?;

    let mut cart = carts.load().await;
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    if let Some(notice) = carts.revalidate_coupon(&mut cart).await {
        tracing::info!(code = %notice.code, "Coupon dropped at checkout");
        carts.save(&cart).await?;
    }

    let summary = PriceSummary::compute(&cart, api.currency());
    let request = build_order_request(&cart, &summary, checkout);
    let order = api.create_order(token, &request).await?;

    tracing::info!(
        order_id = %order.id,
        total = %summary.total,
        payment_method = ?order.payment_method,
        "Order placed"
    );

    if let Err(e) = carts.clear().await {
        tracing::warn!(error = %e, "Order placed but cart could not be cleared");
    }

    Ok(order)
}

/// Where to send the customer after the order is placed: the payment gateway
/// for gateway payment methods, otherwise the confirmation page.
#[must_use]
pub fn next_url(order: &Order) -> String {
    match &order.payment_url {
        Some(url) if order.payment_method.redirects_to_gateway() => url.clone(),
        _ => format!("/checkout/success/{}", urlencoding::encode(order.id.as_str())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use shopfront_core::{CurrencyCode, DiscountPercent};

    use super::*;
    use crate::cart::AppliedCoupon;
    use crate::cart::tests::item;

    fn form() -> CheckoutForm {
        CheckoutForm {
            name: "  Tran Thi B ".to_string(),
            phone: "0912 345 678".to_string(),
            address: "12 Hai Ba Trung, Ha Noi".to_string(),
            note: Some("   ".to_string()),
            payment_method: "vnpay".to_string(),
        }
    }

    #[test]
    fn test_valid_form() {
        let checkout = form().validate().unwrap();
        assert_eq!(checkout.recipient.name, "Tran Thi B");
        assert_eq!(checkout.recipient.phone, "0912345678");
        assert_eq!(checkout.recipient.note, None);
        assert_eq!(checkout.payment_method, PaymentMethod::Vnpay);
    }

    #[test]
    fn test_missing_payment_method_defaults_to_cod() {
        let mut form = form();
        form.payment_method = String::new();
        assert_eq!(form.validate().unwrap().payment_method, PaymentMethod::Cod);
    }

    #[test]
    fn test_collects_every_field_error() {
        let form = CheckoutForm {
            name: " ".to_string(),
            phone: "12ab".to_string(),
            address: String::new(),
            note: None,
            payment_method: "cheque".to_string(),
        };
        let Err(CheckoutError::Invalid(errors)) = form.validate() else {
            panic!("expected validation errors");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, ["name", "phone", "address", "payment_method"]);
    }

    #[test]
    fn test_order_request_carries_discounted_totals() {
        let mut cart = Cart::default();
        cart.add(item("p1", 50_000, 2)).unwrap();
        cart.apply_coupon(AppliedCoupon {
            code: "SALE10".to_string(),
            percent: DiscountPercent::new(Decimal::from(10)).unwrap(),
        });
        let summary = PriceSummary::compute(&cart, CurrencyCode::VND);

        let request = build_order_request(&cart, &summary, form().validate().unwrap());
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].quantity, 2);
        assert_eq!(request.coupon_code.as_deref(), Some("SALE10"));
        assert_eq!(request.subtotal, Decimal::from(100_000));
        assert_eq!(request.discount, Decimal::from(10_000));
        assert_eq!(request.total, Decimal::from(90_000));
    }

    #[test]
    fn test_next_url() {
        let mut order: Order = serde_json::from_value(serde_json::json!({
            "_id": "o 1",
            "recipient": {"name": "A", "phone": "0912345678", "address": "X"},
            "items": [],
            "paymentMethod": "vnpay",
            "subtotal": 1,
            "total": 1,
            "createdAt": "2026-01-02T03:04:05Z",
            "paymentUrl": "https://pay.example/vnp?x=1"
        }))
        .unwrap();
        assert_eq!(next_url(&order), "https://pay.example/vnp?x=1");

        order.payment_method = PaymentMethod::Cod;
        assert_eq!(next_url(&order), "/checkout/success/o%201");
    }
}
