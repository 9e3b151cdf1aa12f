//! Server-side cart store calls.
//!
//! The backend keeps one cart per account. These calls are idempotent
//! (`PUT` replaces the whole cart) so they are safe to retry.

use reqwest::Method;
use tracing::instrument;

use crate::api::retry::{RetryPolicy, retry};
use crate::api::types::ServerCart;
use crate::api::{ApiClient, ApiError};

impl ApiClient {
    /// Fetch the account's server-side cart.
    ///
    /// A missing cart is reported as an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_server_cart(&self, token: &str) -> Result<ServerCart, ApiError> {
        match self.get::<Option<ServerCart>>("cart", &[], Some(token)).await {
            Ok(cart) => Ok(cart.unwrap_or_default()),
            Err(ApiError::NotFound(_)) => Ok(ServerCart::default()),
            Err(e) => Err(e),
        }
    }

    /// Replace the account's server-side cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, cart), fields(lines = cart.items.len()))]
    pub async fn put_server_cart(&self, token: &str, cart: &ServerCart) -> Result<(), ApiError> {
        self.send::<_, serde_json::Value>(Method::PUT, "cart", Some(cart), Some(token))
            .await
            .map(|_| ())
    }

    /// Empty the account's server-side cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn clear_server_cart(&self, token: &str) -> Result<(), ApiError> {
        match self
            .send::<(), serde_json::Value>(Method::DELETE, "cart", None, Some(token))
            .await
        {
            Ok(_) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// [`get_server_cart`](Self::get_server_cart) under a retry policy.
    ///
    /// # Errors
    ///
    /// Returns the last error once the policy is exhausted.
    pub async fn get_server_cart_with_retry(
        &self,
        token: &str,
        policy: RetryPolicy,
    ) -> Result<ServerCart, ApiError> {
        retry(policy, "cart.fetch", || self.get_server_cart(token)).await
    }

    /// [`put_server_cart`](Self::put_server_cart) under a retry policy.
    ///
    /// # Errors
    ///
    /// Returns the last error once the policy is exhausted.
    pub async fn put_server_cart_with_retry(
        &self,
        token: &str,
        cart: &ServerCart,
        policy: RetryPolicy,
    ) -> Result<(), ApiError> {
        retry(policy, "cart.push", || self.put_server_cart(token, cart)).await
    }

    /// [`clear_server_cart`](Self::clear_server_cart) under a retry policy.
    ///
    /// # Errors
    ///
    /// Returns the last error once the policy is exhausted.
    pub async fn clear_server_cart_with_retry(
        &self,
        token: &str,
        policy: RetryPolicy,
    ) -> Result<(), ApiError> {
        retry(policy, "cart.clear", || self.clear_server_cart(token)).await
    }
}
