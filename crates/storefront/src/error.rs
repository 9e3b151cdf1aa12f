//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::ApiError;
use crate::cart::CartError;
use crate::chat::ChatError;
use crate::checkout::CheckoutError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend REST API call failed.
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Chat service call failed.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// How an error is reported: status, client-facing message, and whether it is
/// a server-side fault worth capturing.
struct Disposition {
    status: StatusCode,
    message: String,
    capture: bool,
}

impl Disposition {
    fn client(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            capture: false,
        }
    }

    fn server(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            capture: true,
        }
    }
}

fn api_disposition(err: &ApiError) -> Disposition {
    match err {
        ApiError::NotFound(_) => Disposition::client(StatusCode::NOT_FOUND, "Not found"),
        ApiError::Unauthorized(_) => {
            Disposition::client(StatusCode::UNAUTHORIZED, "Please sign in again")
        }
        ApiError::Rejected(message) => Disposition::client(StatusCode::BAD_REQUEST, message.clone()),
        ApiError::RateLimited(_) => Disposition::client(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests, please try again shortly",
        ),
        ApiError::Http(_) | ApiError::Status { .. } | ApiError::Parse(_) | ApiError::Url(_) => {
            Disposition::server(StatusCode::BAD_GATEWAY, "External service error")
        }
    }
}

fn cart_disposition(err: &CartError) -> Disposition {
    match err {
        CartError::Api(e) => api_disposition(e),
        CartError::Session(_) => {
            Disposition::server(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        CartError::NotInCart(_) => Disposition::client(StatusCode::NOT_FOUND, err.to_string()),
        CartError::InvalidQuantity
        | CartError::OutOfStock(_)
        | CartError::EmptyCouponCode
        | CartError::EmptyCart
        | CartError::CouponRejected(_) => {
            Disposition::client(StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}

impl AppError {
    fn disposition(&self) -> Disposition {
        match self {
            Self::Api(e) => api_disposition(e),
            Self::Cart(e) => cart_disposition(e),
            Self::Checkout(e) => match e {
                CheckoutError::Api(e) => api_disposition(e),
                CheckoutError::Cart(e) => cart_disposition(e),
                CheckoutError::EmptyCart | CheckoutError::Invalid(_) => {
                    Disposition::client(StatusCode::BAD_REQUEST, e.to_string())
                }
            },
            Self::Chat(e) => match e {
                ChatError::SessionNotFound => {
                    Disposition::client(StatusCode::NOT_FOUND, "Conversation not found")
                }
                ChatError::EmptyMessage => {
                    Disposition::client(StatusCode::BAD_REQUEST, e.to_string())
                }
                ChatError::RateLimited(_) => Disposition::client(
                    StatusCode::TOO_MANY_REQUESTS,
                    "The assistant is busy, please try again shortly",
                ),
                ChatError::Api(e) => api_disposition(e),
                ChatError::Http(_) | ChatError::Status { .. } | ChatError::Stream(_) => {
                    Disposition::server(StatusCode::BAD_GATEWAY, "Chat service error")
                }
            },
            Self::Session(_) => {
                Disposition::server(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::BadRequest(_) => Disposition::client(StatusCode::BAD_REQUEST, self.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Disposition {
            status,
            message,
            capture,
        } = self.disposition();

        // Capture server errors to Sentry
        if capture {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, message).into_response()
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Upper-case the first letter of an error message for display.
#[must_use]
pub fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
        assert_eq!(get_status(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_chat_errors_map_to_status_codes() {
        assert_eq!(
            get_status(AppError::Chat(ChatError::SessionNotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Chat(ChatError::EmptyMessage)),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_backend_errors_map_to_gateway_or_client_codes() {
        assert_eq!(
            get_status(AppError::Api(ApiError::Status {
                status: 500,
                message: "boom".to_string()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Api(ApiError::NotFound("p1".to_string()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::Api(ApiError::RateLimited(3)))),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_business_rejections_are_shown_to_the_visitor() {
        let err = AppError::Checkout(CheckoutError::Api(ApiError::Rejected(
            "Only 2 left in stock".to_string(),
        )));
        let disposition = err.disposition();
        assert_eq!(disposition.status, StatusCode::BAD_REQUEST);
        assert_eq!(disposition.message, "Only 2 left in stock");
        assert!(!disposition.capture);

        let err = AppError::Cart(CartError::CouponRejected("Coupon expired".to_string()));
        assert_eq!(err.disposition().message, "Coupon expired");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("invalid email"), "Invalid email");
        assert_eq!(capitalize("đơn hàng"), "Đơn hàng");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Api(ApiError::Status {
            status: 503,
            message: "db connection refused at 10.0.0.3".to_string(),
        });
        let disposition = err.disposition();
        assert_eq!(disposition.message, "External service error");
        assert!(disposition.capture);
    }
}
