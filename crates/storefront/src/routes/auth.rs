//! Authentication route handlers.
//!
//! Credentials are checked by the backend user service; on success the
//! returned bearer token is kept in the session alongside the profile, the
//! cart mirror is merged with the server cart, and the visitor is sent back
//! to where they were going.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use shopfront_core::Email;

use crate::api::ApiError;
use crate::api::types::AuthSession;
use crate::cart::CartService;
use crate::error::{AppError, capitalize, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::routes::{NavView, set_flash};
use crate::state::AppState;

/// Shortest password the register form accepts.
const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Query parameters for the auth pages.
#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub next: Option<String>,
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub nav: NavView,
    pub email: String,
    pub next: String,
    pub error: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub nav: NavView,
    pub name: String,
    pub email: String,
    pub next: String,
    pub error: Option<String>,
}

/// Return target after sign-in, limited to same-site paths.
///
/// Browsers read a backslash as `/` and drop tabs and newlines, so either could
/// turn a path into a scheme-relative URL.
fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Map a query-string error code to a message.
fn error_text(code: &str) -> String {
    match code {
        "session" => "Your session expired. Please sign in again.".to_string(),
        "expired" => "Please sign in again.".to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Query(query): Query<AuthQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref());
    if auth.0.is_some() {
        return Redirect::to(&next).into_response();
    }

    LoginTemplate {
        nav: NavView::load(&state, &session, None).await,
        email: String::new(),
        next,
        error: query.error.as_deref().map(error_text),
    }
    .into_response()
}

/// Re-render the login form with an error.
async fn login_failed(
    state: &AppState,
    session: &Session,
    email: String,
    next: String,
    status: StatusCode,
    message: String,
) -> Response {
    let page = LoginTemplate {
        nav: NavView::load(state, session, None).await,
        email,
        next,
        error: Some(message),
    };
    (status, page).into_response()
}

/// Handle login form submission.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref());
    let email = form.email.trim().to_string();

    let problem = if let Err(e) = Email::parse(&email) {
        Some(capitalize(&e.to_string()))
    } else if form.password.is_empty() {
        Some("Password is required".to_string())
    } else {
        None
    };
    if let Some(message) = problem {
        let status = StatusCode::UNPROCESSABLE_ENTITY;
        return Ok(login_failed(&state, &session, email, next, status, message).await);
    }

    let (status, message) = match state.api().login(&email, &form.password).await {
        Ok(auth) => return sign_in(&state, &session, auth, &next).await,
        Err(ApiError::Unauthorized(_) | ApiError::NotFound(_)) => (
            StatusCode::UNAUTHORIZED,
            "Email or password is incorrect".to_string(),
        ),
        Err(ApiError::Rejected(message)) => (StatusCode::UNPROCESSABLE_ENTITY, message),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(status = %status, "Login rejected");
    Ok(login_failed(&state, &session, email, next, status, message).await)
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Query(query): Query<AuthQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref());
    if auth.0.is_some() {
        return Redirect::to(&next).into_response();
    }

    RegisterTemplate {
        nav: NavView::load(&state, &session, None).await,
        name: String::new(),
        email: String::new(),
        next,
        error: query.error.as_deref().map(error_text),
    }
    .into_response()
}

/// Check a registration form, returning the first problem found.
fn validate_registration(form: &RegisterForm) -> Result<(), String> {
    if form.name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    Email::parse(form.email.trim()).map_err(|e| capitalize(&e.to_string()))?;
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if form.password != form.password_confirm {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

/// Handle registration form submission.
///
/// The user service signs the new account in straight away.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref());

    let message = match validate_registration(&form) {
        Ok(()) => {
            match state
                .api()
                .register(form.name.trim(), form.email.trim(), &form.password)
                .await
            {
                Ok(auth) => return sign_in(&state, &session, auth, &next).await,
                Err(ApiError::Rejected(message)) => message,
                Err(e) => return Err(e.into()),
            }
        }
        Err(message) => message,
    };

    tracing::info!(reason = %message, "Registration rejected");
    let page = RegisterTemplate {
        nav: NavView::load(&state, &session, None).await,
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        next,
        error: Some(message),
    };
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}

/// Store the signed-in user and merge their cart.
async fn sign_in(
    state: &AppState,
    session: &Session,
    auth: AuthSession,
    next: &str,
) -> Result<Response, AppError> {
    // New identity, new session id; the data (cart mirror, chat id) carries over.
    session.cycle_id().await?;

    let user = CurrentUser {
        id: auth.user.id,
        email: auth.user.email,
        name: auth.user.name,
        role: auth.user.role,
        token: auth.token,
    };
    set_current_user(session, &user).await?;

    let update = CartService::new(state.api(), session, state.config().cart_sync_retry)
        .with_token(Some(user.token.as_str()))
        .sync_on_login(&user.token)
        .await?;
    if let Some(notice) = update.notice {
        set_flash(session, notice.message).await;
    }

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, cart_items = update.cart.item_count(), "User signed in");

    Ok(Redirect::to(next).into_response())
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// The cart mirror and chat session go with the rest of the session; the
/// server-side cart stays with the account.
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session user: {}", e);
    }

    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {}", e);
    }

    clear_sentry_user();
    Redirect::to("/").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_form(password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            name: "Linh".to_string(),
            email: "linh@example.com".to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
            next: None,
        }
    }

    #[test]
    fn test_safe_next_only_allows_local_paths() {
        assert_eq!(safe_next(Some("/checkout")), "/checkout");
        assert_eq!(safe_next(Some("/orders?page=2")), "/orders?page=2");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(Some("/orders\\..\\x")), "/");
        assert_eq!(safe_next(Some("/\t/evil.example")), "/");
        assert_eq!(safe_next(Some("/%2F%2Fevil.example")), "/%2F%2Fevil.example");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_registration_validation() {
        assert!(validate_registration(&register_form("hunter22", "hunter22")).is_ok());
        assert_eq!(
            validate_registration(&register_form("short", "short")),
            Err("Password must be at least 8 characters".to_string())
        );
        assert_eq!(
            validate_registration(&register_form("hunter22", "hunter23")),
            Err("Passwords do not match".to_string())
        );

        let mut nameless = register_form("hunter22", "hunter22");
        nameless.name = "  ".to_string();
        assert_eq!(
            validate_registration(&nameless),
            Err("Name is required".to_string())
        );
    }
}
