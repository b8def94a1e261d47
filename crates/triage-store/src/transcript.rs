//! Per-session transcript store.
//!
//! An append-only log of (role, text) turns per session, plus the formatter
//! that renders it into the plain-text history block injected into model
//! prompts.  Empty or whitespace-only text is never appended, so the
//! formatted history has no blank turns.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
}

impl TurnRole {
    /// The prompt-facing label for this role.
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Agent => "Agent",
        }
    }
}

/// One logged turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub role: TurnRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// In-memory transcript store, keyed by session id.
#[derive(Debug, Default)]
pub struct TranscriptStore {
    turns: DashMap<String, Vec<TranscriptTurn>>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn in arrival order.  No-op when `text` is empty or
    /// whitespace-only.
    pub fn append(&self, session_id: &str, role: TurnRole, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        debug!(session_id, role = role.label(), "transcript turn appended");
        self.turns.entry(session_id.to_owned()).or_default().push(TranscriptTurn {
            role,
            text: trimmed.to_owned(),
            at: Utc::now(),
        });
    }

    /// Render the session's transcript as `User:` / `Agent:` lines in
    /// insertion order.  Empty string for unknown sessions.
    pub fn formatted(&self, session_id: &str) -> String {
        let Some(turns) = self.turns.get(session_id) else {
            return String::new();
        };

        turns
            .iter()
            .map(|turn| format!("{}: {}", turn.role.label(), turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Clear all turns for a session.
    pub fn reset(&self, session_id: &str) {
        debug!(session_id, "transcript reset");
        self.turns.remove(session_id);
    }

    /// Snapshot of the session's turns, oldest first.
    pub fn turns(&self, session_id: &str) -> Vec<TranscriptTurn> {
        self.turns.get(session_id).map(|t| t.clone()).unwrap_or_default()
    }
}

// ── tests ────────────────────────────────────────────────────────────
