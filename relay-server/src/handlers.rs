use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_shared::{ChatMessage, ChatRequest, ChatResponse, MessageRole};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::error::RelayError;
use crate::RelayState;

pub async fn health() -> &'static str {
    "OK"
}

/// `POST /api/chat`: validate the payload, relay it upstream, and answer
/// either with one JSON reply or with an incrementally streamed plain-text
/// body, per configuration.
pub async fn chat(State(state): State<RelayState>, body: Bytes) -> Result<Response, RelayError> {
    // Parsed by hand so malformed JSON maps to the relay's own 400 shape.
    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| RelayError::Validation(format!("invalid request body: {e}")))?;
    let messages = normalize(request)?;

    info!(
        messages = messages.len(),
        streaming = state.config.streaming,
        "relaying chat request"
    );

    if state.config.streaming {
        let fragments = state.llm.stream_chat(messages).await?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from_stream(ReceiverStream::new(fragments)))
            .map_err(|e| RelayError::Internal(e.to_string()))?;
        Ok(response)
    } else {
        let reply = state.llm.complete(messages).await?;
        Ok(Json(ChatResponse { reply }).into_response())
    }
}

/// Turns either accepted body form into a non-empty message list. The
/// single-message convenience form becomes a one-element user message.
fn normalize(request: ChatRequest) -> Result<Vec<ChatMessage>, RelayError> {
    match request {
        ChatRequest::Single { message } => {
            if message.trim().is_empty() {
                return Err(RelayError::Validation("message is required".to_string()));
            }
            Ok(vec![ChatMessage {
                role: MessageRole::User,
                content: message,
            }])
        }
        ChatRequest::Multi { messages } => {
            if messages.is_empty() {
                return Err(RelayError::Validation(
                    "messages must be a non-empty array".to_string(),
                ));
            }
            Ok(messages)
        }
    }
}
