//! AI chat widget backend.
//!
//! # Architecture
//!
//! - [`ChatClient`] talks to the chat service: it creates conversation
//!   sessions, reads their history and streams assistant replies.
//! - Replies arrive as server-sent events; [`sse::SseParser`] turns the raw
//!   byte stream into [`ChatStreamEvent`]s.
//! - The storefront relays those events to the browser (`routes::chat`), so
//!   the widget never talks to the chat service directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//!
//! let session_id = chat.create_session(None).await?;
//! let mut events = std::pin::pin!(chat.stream_message(&session_id, "Is this in stock?", None).await?);
//! while let Some(event) = events.next().await {
//!     match event? {
//!         ChatStreamEvent::Delta(text) => print!("{text}"),
//!         ChatStreamEvent::Done => break,
//!         ChatStreamEvent::Error(message) => eprintln!("{message}"),
//!     }
//! }
//! ```

pub mod client;
pub mod sse;

use serde::Serialize;
use thiserror::Error;

use shopfront_core::ChatRole;

use crate::api::ApiError;
use crate::api::types::ChatHistoryMessage;

pub use client::ChatClient;

/// Errors that can occur when talking to the chat service.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Chat service answered with an error status.
    #[error("chat service returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the body, if any.
        message: String,
    },

    /// The conversation no longer exists.
    #[error("chat session not found")]
    SessionNotFound,

    /// Rate limited by the chat service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The reply stream broke off.
    #[error("stream error: {0}")]
    Stream(String),

    /// Empty message submitted.
    #[error("message cannot be empty")]
    EmptyMessage,

    /// Client construction or response decoding failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One streamed reply event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStreamEvent {
    /// A chunk of assistant text.
    Delta(String),
    /// The reply is complete.
    Done,
    /// The chat service reported a failure mid-reply.
    Error(String),
}

/// A chat message as shown in the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub text: String,
    pub role: ChatRole,
    /// Set while the assistant is still writing this message.
    pub streaming: bool,
}

impl ChatMessage {
    /// Whether the visitor wrote this message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == ChatRole::User
    }
}

impl From<ChatHistoryMessage> for ChatMessage {
    fn from(message: ChatHistoryMessage) -> Self {
        Self {
            text: message.content,
            role: message.role,
            streaming: false,
        }
    }
}
