//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Product listing (home)
//! GET  /health                    - Health check
//!
//! # Catalogue
//! GET  /products                  - Product listing (?page, ?search)
//! GET  /products/{id}             - Product detail
//! GET  /categories                - Category listing
//! GET  /categories/{id}           - Products in a category (?page)
//!
//! # Cart (HTMX fragments)
//! GET  /cart                      - Cart page
//! POST /cart/add                  - Add to cart (returns count badge, triggers cart-updated)
//! POST /cart/update               - Update quantity (returns cart panel fragment)
//! POST /cart/remove               - Remove item (returns cart panel fragment)
//! POST /cart/coupon               - Apply coupon (returns cart panel fragment)
//! POST /cart/coupon/remove        - Remove coupon (returns cart panel fragment)
//! GET  /cart/count                - Cart count badge (fragment)
//!
//! # Checkout (requires auth)
//! GET  /checkout                  - Delivery and payment form
//! POST /checkout                  - Place order (redirects to gateway or confirmation)
//! GET  /checkout/success/{id}     - Order confirmation
//!
//! # Orders (requires auth)
//! GET  /orders                    - Order history
//! GET  /orders/{id}               - Order detail
//! POST /orders/{id}/cancel        - Cancel order
//!
//! # Auth (POSTs rate limited)
//! GET  /auth/login                - Login page
//! POST /auth/login                - Login action
//! GET  /auth/register             - Register page
//! POST /auth/register             - Register action
//! POST /auth/logout               - Logout action
//!
//! # Chat widget
//! GET  /chat                      - Chat page
//! POST /chat/messages             - Send message, reply streamed as SSE (rate limited)
//! GET  /chat/history              - Conversation so far (JSON)
//! POST /chat/reset                - Start a new conversation
//!
//! # Admin (requires admin)
//! GET  /admin                     - Dashboard (?status filter)
//! POST /admin/orders/{id}/status  - Change order status
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod chat;
pub mod checkout;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};
use rust_decimal::Decimal;
use shopfront_core::{CurrencyCode, Price};
use tower_sessions::Session;

use crate::cart::CartService;
use crate::middleware::{auth_rate_limiter, chat_rate_limiter};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Products per catalogue page.
pub const PAGE_SIZE: u32 = 12;

// =============================================================================
// Shared view helpers
// =============================================================================

/// Header data every page renders.
#[derive(Clone, Default)]
pub struct NavView {
    pub user_name: Option<String>,
    pub is_admin: bool,
    pub cart_count: u32,
    /// One-shot notice set by the previous request.
    pub flash: Option<String>,
}

impl NavView {
    /// Build the header for the current visitor, consuming any pending flash.
    pub async fn load(state: &AppState, session: &Session, user: Option<&CurrentUser>) -> Self {
        let cart = CartService::new(state.api(), session, state.config().cart_sync_retry)
            .load()
            .await;
        Self {
            user_name: user.map(|u| u.name.clone()),
            is_admin: user.is_some_and(CurrentUser::is_admin),
            cart_count: cart.item_count(),
            flash: take_flash(session).await,
        }
    }
}

/// Format an amount in the storefront currency.
#[must_use]
pub fn money(amount: Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).display()
}

/// Queue a notice for the next page render.
pub async fn set_flash(session: &Session, message: impl Into<String>) {
    if let Err(e) = session.insert(session_keys::FLASH, message.into()).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Take the pending notice, if any.
pub async fn take_flash(session: &Session) -> Option<String> {
    session
        .remove::<String>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
}

/// Whether the request came from HTMX.
#[must_use]
pub fn is_htmx(headers: &axum::http::HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

// =============================================================================
// Routers
// =============================================================================

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index))
        .route("/{id}", get(categories::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/coupon", post(cart::apply_coupon))
        .route("/coupon/remove", post(cart::remove_coupon))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::submit))
        .route("/success/{id}", get(checkout::success))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the auth routes router.
///
/// Form submissions are rate limited; the pages themselves are not.
pub fn auth_routes() -> Router<AppState> {
    let submissions = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/logout", post(auth::logout))
        .merge(submissions)
}

/// Create the chat routes router.
pub fn chat_routes() -> Router<AppState> {
    let messages = Router::new()
        .route("/messages", post(chat::send_message))
        .layer(chat_rate_limiter());

    Router::new()
        .route("/", get(chat::page))
        .route("/history", get(chat::history))
        .route("/reset", post(chat::reset))
        .merge(messages)
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard))
        .route("/orders/{id}/status", post(admin::update_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(products::index))
        // Catalogue
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        // Cart and checkout
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        // Order history
        .nest("/orders", order_routes())
        // Auth routes
        .nest("/auth", auth_routes())
        // Chat widget
        .nest("/chat", chat_routes())
        // Admin dashboard
        .nest("/admin", admin_routes())
}
