//! Engine error types.
//!
//! [`EngineError`] covers internal orchestration failures only.  Collaborator
//! failures never reach this type: handlers catch them at the boundary and
//! turn them into degraded chat responses, so the user always gets a message
//! and never a raw error.

/// Unified error type for the turn engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The streaming event channel closed before the turn finished.
    #[error("turn event channel closed")]
    ChannelClosed,

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;
