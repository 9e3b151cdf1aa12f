//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The cart itself lives in the session and is mirrored to the backend for
//! signed-in users (see [`CartService`]).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use shopfront_core::{CurrencyCode, ProductId};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::{Cart, CartError, CartService, CartUpdate, PriceSummary};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::{NavView, is_htmx, money, set_flash};
use crate::state::AppState;

/// Cart item display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub coupon_code: Option<String>,
    pub discount_percent: String,
    pub discount: String,
    pub has_discount: bool,
    pub total: String,
}

impl CartView {
    /// Build the view for `cart`, priced in `currency`.
    #[must_use]
    pub fn new(cart: &Cart, currency: CurrencyCode) -> Self {
        let summary = PriceSummary::compute(cart, currency);
        Self {
            items: cart
                .items
                .iter()
                .map(|item| CartItemView {
                    product_id: item.product_id.to_string(),
                    name: item.name.clone(),
                    image: item.image.clone(),
                    quantity: item.quantity,
                    price: money(item.unit_price, currency),
                    line_price: money(item.line_total(), currency),
                })
                .collect(),
            item_count: summary.item_count,
            subtotal: summary.subtotal.display(),
            coupon_code: cart.coupon.as_ref().map(|c| c.code.clone()),
            discount_percent: summary.discount_percent.to_string(),
            discount: summary.discount.display(),
            has_discount: summary.has_discount(),
            total: summary.total.display(),
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    #[serde(default)]
    pub code: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub nav: NavView,
    pub cart: CartView,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Cart panel fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_panel.html")]
pub struct CartPanelTemplate {
    pub cart: CartView,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Inline refusal shown next to an add-to-cart button.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_error.html")]
pub struct CartErrorTemplate {
    pub message: String,
}

fn cart_service<'a>(
    state: &'a AppState,
    session: &'a Session,
    auth: &'a OptionalAuth,
) -> CartService<'a> {
    CartService::new(state.api(), session, state.config().cart_sync_retry).with_token(auth.token())
}

/// Render the cart panel after a mutation.
///
/// Business-rule failures (unknown line, rejected coupon) are shown inside the
/// panel; anything else becomes an error response.
async fn panel_response(
    state: &AppState,
    service: &CartService<'_>,
    result: Result<CartUpdate, CartError>,
) -> Response {
    let currency = state.api().currency();
    match result {
        Ok(update) => (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartPanelTemplate {
                cart: CartView::new(&update.cart, currency),
                notice: update.notice.map(|n| n.message),
                error: None,
            },
        )
            .into_response(),
        Err(e @ (CartError::Session(_) | CartError::Api(_))) => AppError::from(e).into_response(),
        Err(e) => {
            let cart = service.load().await;
            CartPanelTemplate {
                cart: CartView::new(&cart, currency),
                notice: None,
                error: Some(e.to_string()),
            }
            .into_response()
        }
    }
}

/// Display cart page.
#[instrument(skip(state, session, auth))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> impl IntoResponse {
    let service = cart_service(&state, &session, &auth);
    let mut cart = service.load().await;

    // The coupon may have expired since it was applied.
    let notice = service.revalidate_coupon(&mut cart).await;
    if notice.is_some()
        && let Err(e) = service.save(&cart).await
    {
        tracing::warn!(error = %e, "Failed to save cart after coupon check");
    }

    CartShowTemplate {
        nav: NavView::load(&state, &session, auth.0.as_ref()).await,
        cart: CartView::new(&cart, state.api().currency()),
        notice: notice.map(|n| n.message),
        error: None,
    }
}

/// Add item to cart (HTMX).
///
/// The product is looked up so the line carries the current name and price.
/// Returns the count badge with an HTMX trigger, or redirects to the cart for
/// plain form posts.
#[instrument(skip(state, session, auth, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let product = match state.api().get_product(&form.product_id).await {
        Ok(product) => product,
        Err(e) => return AppError::from(e).into_response(),
    };

    let service = cart_service(&state, &session, &auth);
    match service.add_item(&product, form.quantity.unwrap_or(1)).await {
        Ok(update) => {
            add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product.id.as_str())]));
            if is_htmx(&headers) {
                (
                    AppendHeaders([("HX-Trigger", "cart-updated")]),
                    CartCountTemplate {
                        count: update.cart.item_count(),
                    },
                )
                    .into_response()
            } else {
                if let Some(notice) = update.notice {
                    set_flash(&session, notice.message).await;
                }
                Redirect::to("/cart").into_response()
            }
        }
        Err(e @ (CartError::OutOfStock(_) | CartError::InvalidQuantity)) => {
            tracing::info!(error = %e, "Add to cart refused");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                CartErrorTemplate {
                    message: e.to_string(),
                },
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to add item to cart: {e}");
            AppError::from(e).into_response()
        }
    }
}

/// Update cart item quantity (HTMX).
#[instrument(skip(state, session, auth))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let service = cart_service(&state, &session, &auth);
    let result = service
        .update_item(&ProductId::new(form.product_id), form.quantity)
        .await;
    panel_response(&state, &service, result).await
}

/// Remove item from cart (HTMX).
#[instrument(skip(state, session, auth))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let service = cart_service(&state, &session, &auth);
    let result = service.remove_item(&ProductId::new(form.product_id)).await;
    panel_response(&state, &service, result).await
}

/// Apply a coupon code (HTMX).
#[instrument(skip(state, session, auth))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Form(form): Form<CouponForm>,
) -> Response {
    let service = cart_service(&state, &session, &auth);
    let result = service
        .apply_coupon(&form.code)
        .await
        .map(|cart| CartUpdate { cart, notice: None });
    panel_response(&state, &service, result).await
}

/// Remove the applied coupon (HTMX).
#[instrument(skip(state, session, auth))]
pub async fn remove_coupon(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Response {
    let service = cart_service(&state, &session, &auth);
    let result = service
        .remove_coupon()
        .await
        .map(|cart| CartUpdate { cart, notice: None });
    panel_response(&state, &service, result).await
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session, auth))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> impl IntoResponse {
    let count = cart_service(&state, &session, &auth)
        .load()
        .await
        .item_count();
    CartCountTemplate { count }
}
