//! Chat widget route handlers.
//!
//! The browser never talks to the chat service directly: it posts messages
//! here and reads the assistant's reply back as server-sent events
//! (`delta` with a text chunk, then `done`, or `error` with a message).

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::State,
    response::{
        IntoResponse, Redirect, Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::ChatSessionId;

use crate::chat::{ChatError, ChatMessage, ChatStreamEvent};
use crate::error::AppError;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::session_keys;
use crate::routes::NavView;
use crate::state::AppState;

/// Request to send a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Chat page template.
#[derive(Template, WebTemplate)]
#[template(path = "chat/index.html")]
pub struct ChatTemplate {
    pub nav: NavView,
    pub messages: Vec<ChatMessage>,
}

async fn stored_session_id(session: &Session) -> Option<ChatSessionId> {
    match session.get::<ChatSessionId>(session_keys::CHAT_SESSION_ID).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable chat session id");
            None
        }
    }
}

/// Conversation so far, or nothing if the stored conversation is gone.
async fn load_history(state: &AppState, session: &Session, token: Option<&str>) -> Vec<ChatMessage> {
    let Some(session_id) = stored_session_id(session).await else {
        return Vec::new();
    };

    match state.chat().history(&session_id, token).await {
        Ok(messages) => messages.into_iter().map(ChatMessage::from).collect(),
        Err(ChatError::SessionNotFound) => {
            tracing::info!(session_id = %session_id, "Chat session expired");
            forget_session(session).await;
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load chat history");
            Vec::new()
        }
    }
}

async fn forget_session(session: &Session) {
    if let Err(e) = session
        .remove::<ChatSessionId>(session_keys::CHAT_SESSION_ID)
        .await
    {
        tracing::warn!(error = %e, "Failed to clear chat session id");
    }
}

/// Create a conversation and remember it for this visitor.
async fn start_session(
    state: &AppState,
    session: &Session,
    token: Option<&str>,
) -> Result<ChatSessionId, AppError> {
    let session_id = state.chat().create_session(token).await?;
    session
        .insert(session_keys::CHAT_SESSION_ID, &session_id)
        .await?;
    Ok(session_id)
}

/// Display the chat page.
pub async fn page(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> impl IntoResponse {
    let messages = load_history(&state, &session, auth.token()).await;
    ChatTemplate {
        nav: NavView::load(&state, &session, auth.0.as_ref()).await,
        messages,
    }
}

/// Conversation so far as JSON, for the widget.
pub async fn history(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Json<Vec<ChatMessage>> {
    Json(load_history(&state, &session, auth.token()).await)
}

/// Send a message and relay the reply as server-sent events.
///
/// The conversation is created on first use. If the stored one has expired
/// a fresh conversation is started and the message is sent once more.
#[instrument(skip(state, session, auth, request))]
pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Json(request): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if request.message.trim().is_empty() {
        return Err(ChatError::EmptyMessage.into());
    }

    let token = auth.token();
    let session_id = match stored_session_id(&session).await {
        Some(id) => id,
        None => start_session(&state, &session, token).await?,
    };

    let events = match state
        .chat()
        .stream_message(&session_id, &request.message, token)
        .await
    {
        Err(ChatError::SessionNotFound) => {
            tracing::info!(session_id = %session_id, "Chat session expired, starting a new one");
            let session_id = start_session(&state, &session, token).await?;
            state
                .chat()
                .stream_message(&session_id, &request.message, token)
                .await?
        }
        other => other?,
    };

    let sse_stream = events.map(|event| {
        let event = match event {
            Ok(ChatStreamEvent::Delta(text)) => {
                Event::default().event("delta").data(sse_safe(&text))
            }
            Ok(ChatStreamEvent::Done) => Event::default().event("done").data(""),
            Ok(ChatStreamEvent::Error(message)) => {
                Event::default().event("error").data(sse_safe(&message))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Chat reply stream failed");
                Event::default()
                    .event("error")
                    .data("The assistant stopped responding. Please try again.")
            }
        };
        Ok(event)
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

/// SSE data cannot carry carriage returns.
fn sse_safe(text: &str) -> String {
    text.replace('\r', "")
}

/// Forget the current conversation; the next message starts a new one.
pub async fn reset(session: Session) -> Redirect {
    forget_session(&session).await;
    Redirect::to("/chat")
}
