//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::chat::{ChatClient, ChatError};
use crate::config::StorefrontConfig;

/// Error building the backend clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend client: {0}")]
    Api(#[from] ApiError),
    #[error("chat client: {0}")]
    Chat(#[from] ChatError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the backend clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    chat: ChatClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let api = ApiClient::new(&config.backend, config.currency)?;
        let chat = ChatClient::new(&config.backend)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, api, chat }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend REST client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the chat service client.
    #[must_use]
    pub fn chat(&self) -> &ChatClient {
        &self.inner.chat
    }
}
