//! Incremental parser for the chat service's server-sent event stream.
//!
//! Events are separated by a blank line. Only `data:` fields matter: several
//! data lines in one event are joined with `\n`, `:` comment lines are
//! ignored, and `[DONE]` ends the reply. A data payload may be:
//!
//! - `{"type":"delta","content":"..."}`, `{"type":"done"}` or
//!   `{"type":"error","message":"..."}`;
//! - `{"content":"..."}` or a bare JSON string, both treated as a delta;
//! - plain text, also treated as a delta.
//!
//! JSON events with an unknown `type` are skipped.

use serde_json::Value;

use crate::chat::ChatStreamEvent;

/// Buffers raw bytes and yields complete events.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl SseParser {
    /// Create an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ChatStreamEvent> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut events = Vec::new();
        while let Some(raw) = extract_sse_event(&mut self.buffer) {
            if let Some(event) = parse_sse_event(&raw) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a final event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<ChatStreamEvent> {
        if !self.pending.is_empty() {
            self.buffer
                .push_str(&String::from_utf8_lossy(&std::mem::take(&mut self.pending)));
        }
        let raw = std::mem::take(&mut self.buffer);
        parse_sse_event(&normalize_newlines(&raw))
    }

    /// Move decoded text into the buffer.
    ///
    /// Newlines are normalised over the whole buffer, since a `\r\n` pair
    /// may arrive split across two chunks.
    fn decode_pending(&mut self) {
        // Hold back an incomplete trailing sequence; invalid bytes mid-stream
        // are decoded lossily rather than stalling.
        let valid = match std::str::from_utf8(&self.pending) {
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            _ => self.pending.len(),
        };

        let rest = self.pending.split_off(valid);
        self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
        self.pending = rest;

        if self.buffer.contains("\r\n") {
            self.buffer = normalize_newlines(&self.buffer);
        }
    }
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Extract a complete SSE event from the buffer.
///
/// Returns `Some(event)` if a complete event was found (and removes it from buffer),
/// or `None` if no complete event is available yet.
fn extract_sse_event(buffer: &mut String) -> Option<String> {
    buffer.find("\n\n").map(|idx| {
        let event = buffer[..idx].to_string();
        buffer.replace_range(..idx + 2, "");
        event
    })
}

/// Parse one SSE event block.
fn parse_sse_event(event: &str) -> Option<ChatStreamEvent> {
    if event.trim().is_empty() {
        return None;
    }

    let mut data_lines = Vec::new();
    for line in event.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    let data = data_lines.join("\n");

    if data.trim() == "[DONE]" {
        return Some(ChatStreamEvent::Done);
    }

    match serde_json::from_str::<Value>(&data) {
        Ok(value) => parse_json_event(value),
        Err(_) => Some(ChatStreamEvent::Delta(data)),
    }
}

fn parse_json_event(value: Value) -> Option<ChatStreamEvent> {
    let text_field = |value: &Value, keys: &[&str]| {
        keys.iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(ToString::to_string)
    };

    match &value {
        Value::String(text) => Some(ChatStreamEvent::Delta(text.clone())),
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some("delta" | "chunk" | "token") => {
                text_field(&value, &["content", "text", "delta"]).map(ChatStreamEvent::Delta)
            }
            Some("done" | "end") => Some(ChatStreamEvent::Done),
            Some("error") => Some(ChatStreamEvent::Error(
                text_field(&value, &["message", "error"])
                    .unwrap_or_else(|| "The assistant could not answer".to_string()),
            )),
            Some(other) => {
                tracing::debug!(event_type = other, "Skipping unknown chat event");
                None
            }
            None => text_field(&value, &["content", "text"]).map(ChatStreamEvent::Delta),
        },
        _ => None,
    }
}
