//! Turn events for the streaming path.
//!
//! A streamed turn is a sequence of discrete, tagged events: zero or more
//! `thought`s in generation order, then exactly one `response` or `error`,
//! then the terminal sentinel.  The sentinel always follows the last event,
//! so consumers can treat the stream as closed the moment they see it.

use serde::Serialize;

/// Wire sentinel that terminates an event stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One event emitted while a turn is being processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A progress thought from the active handler.
    Thought(String),
    /// The turn's final user-facing text.
    Response(String),
    /// The turn failed inside the engine; no response will follow.
    Error(String),
    /// Terminal marker.  Never followed by another event.
    Done,
}

impl TurnEvent {
    /// The SSE `data:` payload for this event: JSON for the tagged events,
    /// the bare sentinel for [`TurnEvent::Done`].
    pub fn sse_data(&self) -> String {
        match self {
            Self::Done => DONE_SENTINEL.to_owned(),
            event => serde_json::to_string(event)
                .unwrap_or_else(|_| format!("{{\"type\":\"error\",\"content\":\"{event:?}\"}}")),
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
