//! User service calls.

use reqwest::Method;
use tracing::instrument;

use crate::api::types::{AuthSession, LoginRequest, RegisterRequest, UserProfile};
use crate::api::{ApiClient, ApiError};

impl ApiClient {
    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` or `ApiError::Rejected` for bad
    /// credentials, or another error if the request fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let body = LoginRequest { email, password };
        self.send(Method::POST, "auth/login", Some(&body), None).await
    }

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the email is taken or the input is
    /// refused, or another error if the request fails.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ApiError> {
        let body = RegisterRequest {
            name,
            email,
            password,
        };
        self.send(Method::POST, "auth/register", Some(&body), None)
            .await
    }

    /// Profile behind a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token has expired.
    #[instrument(skip(self, token))]
    pub async fn me(&self, token: &str) -> Result<UserProfile, ApiError> {
        self.get("users/me", &[], Some(token)).await
    }
}
