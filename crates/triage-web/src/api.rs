//! REST API route handlers.
//!
//! The request and response shapes here are the protocol surface: `type`
//! mirrors `intent` for compatibility with existing clients, and the stream
//! route frames engine events as SSE `data:` lines ending with `[DONE]`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use triage_store::SessionState;

use crate::state::AppState;

fn default_session_id() -> String {
    "default".to_owned()
}

/// Body of the chat and reset endpoints.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's latest message.
    pub input: String,
    /// Session identifier for state persistence.
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

/// Response of `POST /chat/reasoned`.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub intent: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub node: String,
    pub context: Vec<Value>,
}

impl From<SessionState> for ChatResponse {
    fn from(state: SessionState) -> Self {
        let context = state
            .retrieval_context
            .unwrap_or_default()
            .into_iter()
            .map(|item| serde_json::to_value(item).unwrap_or(Value::Null))
            .collect();

        Self {
            response: state.response,
            intent: state.intent,
            kind: state.kind,
            node: state.node,
            context,
        }
    }
}

/// `POST /chat/reasoned` — run one turn and return its result.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let result = state
        .orchestrator
        .handle_turn(&request.session_id, &request.input)
        .await;
    Json(result.into())
}

/// `POST /chat/reasoned/stream` — the same turn as an SSE event stream.
///
/// Events arrive in generation order (thoughts, then the response or an
/// error) and the final `data:` line is the bare `[DONE]` sentinel.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state
        .orchestrator
        .handle_turn_stream(request.session_id, request.input);

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok(Event::default().data(event.sse_data())), rx))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Body of the reset endpoint.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

/// Response of `POST /chat/reset`.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
}

/// `POST /chat/reset` — clear the session's conversation transcript.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetRequest>,
) -> Json<ResetResponse> {
    state.orchestrator.reset_session(&request.session_id);
    Json(ResetResponse {
        message: "Memory has been cleared.".to_owned(),
    })
}

/// Response of `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_sessions: usize,
}

/// `GET /api/status` — minimal health and version probe.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.orchestrator.session_count(),
    })
}
