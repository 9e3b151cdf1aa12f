//! Authentication middleware and extractors.
//!
//! The signed-in user lives in the session (see [`CurrentUser`]). These
//! extractors read it back for route handlers.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};

/// Extractor that requires a signed-in user.
///
/// If nobody is signed in, the request is redirected to the login page with
/// the full original path as the return target.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in admin.
pub struct RequireAdmin(pub CurrentUser);

/// Error returned when authentication is required but the user is not signed in.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    /// Redirect to login page.
    RedirectToLogin(String),
    /// Signed in, but not an admin.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => Redirect::to(&next).into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

/// Login URL that returns to the requested page afterwards.
///
/// Nested routers see their path with the mount prefix stripped, so the
/// original URI is preferred.
fn login_redirect(parts: &Parts) -> String {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0);
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("/auth/login?next={}", urlencoding::encode(target))
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    match session.get::<CurrentUser>(session_keys::CURRENT_USER).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable user in session");
            None
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match current_user(parts).await {
            Some(user) => Ok(Self(user)),
            None => Err(AuthRejection::RedirectToLogin(login_redirect(parts))),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin denied");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl OptionalAuth {
    /// Bearer token of the signed-in user, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.0.as_ref().map(|user| user.token.as_str())
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await))
    }
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use shopfront_core::{UserId, UserRole};
    use tower_sessions::MemoryStore;

    use super::*;

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new("u1"),
            email: "mai@example.com".to_string(),
            name: "Mai".to_string(),
            role,
            token: "t".to_string(),
        }
    }

    async fn parts(uri: &str, signed_in: Option<CurrentUser>) -> Parts {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        if let Some(user) = signed_in {
            set_current_user(&session, &user).await.unwrap();
        }
        let (mut parts, ()) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        parts.extensions.insert(session);
        parts
    }

    #[tokio::test]
    async fn test_require_auth_redirects_pages_with_return_path() {
        let mut parts = parts("/orders?page=2", None).await;
        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(
            rejection,
            AuthRejection::RedirectToLogin("/auth/login?next=%2Forders%3Fpage%3D2".to_string())
        );
    }

    #[tokio::test]
    async fn test_require_auth_returns_to_original_path_under_nesting() {
        // What a router nested at `/orders` hands the extractor for `/orders/o7`.
        let mut parts = parts("/o7", None).await;
        parts
            .extensions
            .insert(OriginalUri("/orders/o7".parse().unwrap()));
        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(
            rejection,
            AuthRejection::RedirectToLogin("/auth/login?next=%2Forders%2Fo7".to_string())
        );
    }

    #[tokio::test]
    async fn test_require_admin() {
        let mut parts_customer = parts("/admin", Some(user(UserRole::Customer))).await;
        let rejection = RequireAdmin::from_request_parts(&mut parts_customer, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection, AuthRejection::Forbidden);

        let mut parts_admin = parts("/admin", Some(user(UserRole::Admin))).await;
        let RequireAdmin(admin) = RequireAdmin::from_request_parts(&mut parts_admin, &())
            .await
            .ok()
            .unwrap();
        assert_eq!(admin.name, "Mai");
    }

    #[tokio::test]
    async fn test_optional_auth() {
        let mut anonymous = parts("/", None).await;
        let auth = OptionalAuth::from_request_parts(&mut anonymous, &()).await.unwrap();
        assert!(auth.token().is_none());

        let mut signed_in = parts("/", Some(user(UserRole::Customer))).await;
        let auth = OptionalAuth::from_request_parts(&mut signed_in, &()).await.unwrap();
        assert_eq!(auth.token(), Some("t"));
    }
}
