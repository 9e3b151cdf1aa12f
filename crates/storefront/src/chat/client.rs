//! Chat service client.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use shopfront_core::ChatSessionId;
use tracing::instrument;
use url::Url;

use crate::api::types::ChatHistoryMessage;
use crate::api::{decode_body, default_headers, error_message};
use crate::chat::sse::SseParser;
use crate::chat::{ChatError, ChatStreamEvent};
use crate::config::BackendConfig;

/// Longest silence tolerated between two chunks of a streamed reply.
const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Client for the chat service.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ChatClientInner>,
}

struct ChatClientInner {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct CreatedSession {
    #[serde(alias = "sessionId", alias = "_id")]
    id: ChatSessionId,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    message: &'a str,
}

impl ChatClient {
    /// Create a new chat client.
    ///
    /// Streamed replies can run for a long time, so instead of a total request
    /// timeout the client bounds the connect time and the gap between chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers(config)?)
            .connect_timeout(config.timeout)
            .read_timeout(STREAM_READ_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(ChatClientInner {
                client,
                base_url: config.chat_url.clone(),
            }),
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<reqwest::RequestBuilder, ChatError> {
        let url = self
            .inner
            .base_url
            .join(path)
            .map_err(crate::api::ApiError::from)?;
        let mut request = self.inner.client.request(method, url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request)
    }

    /// Start a new conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn create_session(&self, token: Option<&str>) -> Result<ChatSessionId, ChatError> {
        let response = self
            .request(reqwest::Method::POST, "chat/sessions", token)?
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let created: CreatedSession = read_json(response).await?;
        tracing::debug!(session_id = %created.id, "Chat session created");
        Ok(created.id)
    }

    /// Messages exchanged so far in a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::SessionNotFound`] if the conversation has expired.
    #[instrument(skip(self, token), fields(session_id = %session_id))]
    pub async fn history(
        &self,
        session_id: &ChatSessionId,
        token: Option<&str>,
    ) -> Result<Vec<ChatHistoryMessage>, ChatError> {
        let path = format!(
            "chat/sessions/{}/messages",
            urlencoding::encode(session_id.as_str())
        );
        let response = self
            .request(reqwest::Method::GET, &path, token)?
            .send()
            .await?;
        read_json(response).await
    }

    /// Send a message and stream the assistant's reply.
    ///
    /// The stream ends after [`ChatStreamEvent::Done`]. If the chat service
    /// closes the connection without a terminator, a final `Done` is emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is empty or the chat service refuses the
    /// request; failures after the reply has started arrive as stream items.
    #[instrument(skip(self, message, token), fields(session_id = %session_id))]
    pub async fn stream_message(
        &self,
        session_id: &ChatSessionId,
        message: &str,
        token: Option<&str>,
    ) -> Result<impl Stream<Item = Result<ChatStreamEvent, ChatError>> + use<>, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let message: String = message.chars().take(MAX_MESSAGE_CHARS).collect();

        let path = format!(
            "chat/sessions/{}/stream",
            urlencoding::encode(session_id.as_str())
        );
        let response = self
            .request(reqwest::Method::POST, &path, token)?
            .header(ACCEPT, "text/event-stream")
            .json(&SendMessageRequest { message: &message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(response).await);
        }

        Ok(stream! {
            use futures::StreamExt;

            let mut parser = SseParser::new();
            let mut byte_stream = std::pin::pin!(response.bytes_stream());

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        for event in parser.push(&chunk) {
                            let done = event == ChatStreamEvent::Done;
                            yield Ok(event);
                            if done {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ChatError::Stream(e.to_string()));
                        return;
                    }
                }
            }

            if let Some(event) = parser.finish() {
                let done = event == ChatStreamEvent::Done;
                yield Ok(event);
                if done {
                    return;
                }
            }
            yield Ok(ChatStreamEvent::Done);
        })
    }
}

/// Decode a success body, or map the error status.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ChatError> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    let text = response.text().await?;
    Ok(decode_body(&text)?)
}

/// Map an error status code.
async fn status_error(response: reqwest::Response) -> ChatError {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return ChatError::RateLimited(retry_after);
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return ChatError::SessionNotFound;
    }

    match response.text().await {
        Ok(body) => ChatError::Status {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or(body),
        },
        Err(e) => ChatError::Http(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_session_accepts_id_variants() {
        for body in [r#"{"id":"s1"}"#, r#"{"sessionId":"s1"}"#, r#"{"_id":"s1"}"#] {
            let created: CreatedSession = serde_json::from_str(body).unwrap_or_else(|e| {
                panic!("{body}: {e}");
            });
            assert_eq!(created.id.as_str(), "s1");
        }
    }

    #[test]
    fn test_chat_client_is_clone_send_sync() {
        fn assert_traits<T: Clone + Send + Sync>() {}
        assert_traits::<ChatClient>();
    }
}
