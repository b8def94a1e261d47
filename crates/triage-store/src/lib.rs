//! Session-scoped storage for Triage — the state record, the state store,
//! and the transcript store.
//!
//! Everything here is process-memory for the lifetime of the session; there
//! is deliberately no durability layer.

pub mod session;
pub mod state;
pub mod transcript;

pub use session::SessionStateStore;
pub use state::{
    BugTemplate, DEFAULT_BUG_PRIORITY, DEFAULT_BUG_SEVERITY, DEFAULT_REPRO_STEPS,
    DEFAULT_STORY_POINTS, EMPTY_FIELD, SessionState, StoryTemplate, coerce_f64, coerce_i64,
};
pub use transcript::{TranscriptStore, TranscriptTurn, TurnRole};
