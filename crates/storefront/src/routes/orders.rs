//! Order history route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use shopfront_core::{CurrencyCode, OrderStatus};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::ApiError;
use crate::api::types::Order;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::{NavView, money, set_flash};
use crate::state::AppState;

/// Order line display data for templates.
#[derive(Clone)]
pub struct OrderItemView {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: String,
    pub created_at: String,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub can_cancel: bool,
    pub payment_method: &'static str,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_address: String,
    pub note: Option<String>,
    pub items: Vec<OrderItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub coupon_code: Option<String>,
    pub discount: Option<String>,
    pub total: String,
}

impl OrderView {
    /// Build the view for `order`, priced in `currency`.
    #[must_use]
    pub fn new(order: &Order, currency: CurrencyCode) -> Self {
        Self {
            id: order.id.to_string(),
            created_at: order.created_at.format("%d/%m/%Y %H:%M").to_string(),
            status: order.status,
            status_label: order.status.label(),
            can_cancel: order.status.is_cancellable(),
            payment_method: order.payment_method.label(),
            recipient_name: order.recipient.name.clone(),
            recipient_phone: order.recipient.phone.clone(),
            recipient_address: order.recipient.address.clone(),
            note: order.recipient.note.clone(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemView {
                    product_id: item.product_id.to_string(),
                    name: item.name.clone(),
                    image: item.image.clone(),
                    quantity: item.quantity,
                    price: money(item.price, currency),
                    line_price: money(item.price * rust_decimal::Decimal::from(item.quantity), currency),
                })
                .collect(),
            item_count: order
                .items
                .iter()
                .fold(0u32, |acc, item| acc.saturating_add(item.quantity)),
            subtotal: money(order.subtotal, currency),
            coupon_code: order.coupon_code.clone(),
            discount: (!order.discount.is_zero()).then(|| money(order.discount, currency)),
            total: money(order.total, currency),
        }
    }
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub nav: NavView,
    pub orders: Vec<OrderView>,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub nav: NavView,
    pub order: OrderView,
}

/// Display the signed-in customer's orders.
#[instrument(skip(state, session, user))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let currency = state.api().currency();
    let orders = state
        .api()
        .list_my_orders(&user.token)
        .await?
        .iter()
        .map(|order| OrderView::new(order, currency))
        .collect();

    Ok(OrdersIndexTemplate {
        nav: NavView::load(&state, &session, Some(&user)).await,
        orders,
    })
}

/// Display one order.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.api().get_order(&user.token, &id).await?;

    Ok(OrderShowTemplate {
        nav: NavView::load(&state, &session, Some(&user)).await,
        order: OrderView::new(&order, state.api().currency()),
    })
}

/// Cancel an order.
///
/// The backend decides whether the order can still be cancelled; its reason
/// is shown when it refuses.
#[instrument(skip(state, session, user))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Response {
    let back = format!("/orders/{}", urlencoding::encode(&id));

    match state.api().cancel_order(&user.token, &id).await {
        Ok(order) => {
            tracing::info!(order_id = %order.id, "Order cancelled by customer");
            set_flash(&session, "Your order has been cancelled.").await;
        }
        Err(ApiError::Rejected(message)) => set_flash(&session, message).await,
        Err(e) => return AppError::from(e).into_response(),
    }

    Redirect::to(&back).into_response()
}
