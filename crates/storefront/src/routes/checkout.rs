//! Checkout route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use shopfront_core::PaymentMethod;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::ApiError;
use crate::cart::CartService;
use crate::checkout::{CheckoutError, CheckoutForm, FieldError, next_url, place_order};
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::cart::CartView;
use crate::routes::orders::OrderView;
use crate::routes::{NavView, set_flash};
use crate::state::AppState;

/// Payment method choice for the form.
#[derive(Clone)]
pub struct PaymentOptionView {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn payment_options(selected: &str) -> Vec<PaymentOptionView> {
    [
        (PaymentMethod::Cod, "cod"),
        (PaymentMethod::BankTransfer, "bank_transfer"),
        (PaymentMethod::Vnpay, "vnpay"),
    ]
    .into_iter()
    .map(|(method, value)| PaymentOptionView {
        value,
        label: method.label(),
        selected: value == selected || (selected.is_empty() && method == PaymentMethod::default()),
    })
    .collect()
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub nav: NavView,
    pub cart: CartView,
    pub form: CheckoutForm,
    pub payment_options: Vec<PaymentOptionView>,
    pub errors: Vec<FieldError>,
    pub error: Option<String>,
}

impl CheckoutTemplate {
    /// Message for one field, if it failed validation.
    #[must_use]
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct CheckoutSuccessTemplate {
    pub nav: NavView,
    pub order: OrderView,
}

/// Display the checkout form.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Response {
    let cart = CartService::new(state.api(), &session, state.config().cart_sync_retry)
        .with_token(Some(user.token.as_str()))
        .load()
        .await;
    if cart.is_empty() {
        return Redirect::to("/cart").into_response();
    }

    let form = CheckoutForm {
        name: user.name.clone(),
        ..CheckoutForm::default()
    };
    CheckoutTemplate {
        nav: NavView::load(&state, &session, Some(&user)).await,
        cart: CartView::new(&cart, state.api().currency()),
        payment_options: payment_options(&form.payment_method),
        form,
        errors: Vec::new(),
        error: None,
    }
    .into_response()
}

/// Place the order.
///
/// Redirects to the payment gateway or the confirmation page on success;
/// re-renders the form with the problem otherwise.
#[instrument(skip(state, session, user, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Response {
    let service = CartService::new(state.api(), &session, state.config().cart_sync_retry)
        .with_token(Some(user.token.as_str()));

    let (status, errors, error) =
        match place_order(state.api(), &service, Some(user.token.as_str()), &form).await {
            Ok(order) => return Redirect::to(&next_url(&order)).into_response(),
            Err(CheckoutError::EmptyCart) => {
                set_flash(&session, "Your cart is empty.").await;
                return Redirect::to("/cart").into_response();
            }
            Err(CheckoutError::Invalid(errors)) => (StatusCode::UNPROCESSABLE_ENTITY, errors, None),
            Err(CheckoutError::Api(ApiError::Rejected(message))) => {
                tracing::info!(reason = %message, "Order rejected by backend");
                (StatusCode::UNPROCESSABLE_ENTITY, Vec::new(), Some(message))
            }
            Err(CheckoutError::Api(ApiError::Unauthorized(_))) => {
                return Redirect::to("/auth/login?next=%2Fcheckout").into_response();
            }
            Err(e) => return AppError::from(e).into_response(),
        };

    let cart = service.load().await;
    let template = CheckoutTemplate {
        nav: NavView::load(&state, &session, Some(&user)).await,
        cart: CartView::new(&cart, state.api().currency()),
        payment_options: payment_options(&form.payment_method),
        form,
        errors,
        error,
    };
    (status, template).into_response()
}

/// Display the order confirmation.
#[instrument(skip(state, session, user))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.api().get_order(&user.token, &id).await?;
    Ok(CheckoutSuccessTemplate {
        nav: NavView::load(&state, &session, Some(&user)).await,
        order: OrderView::new(&order, state.api().currency()),
    })
}
