//! Collaborator error types.
//!
//! All collaborator clients surface errors through [`AdapterError`].  Each
//! variant carries the service name so handlers can log a useful degraded
//! response without inspecting opaque strings.

/// Unified error type for the Triage collaborator clients.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// An HTTP request to a collaborator failed before a response arrived
    /// (connection refused, DNS, timeout).
    #[error("{service} request failed: {reason}")]
    RequestFailed { service: &'static str, reason: String },

    /// The collaborator answered with a non-success status code.
    #[error("{service} returned status {status}: {detail}")]
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        detail: String,
    },

    /// The response body could not be parsed into the expected shape.
    #[error("{service} response parse error: {reason}")]
    InvalidResponse { service: &'static str, reason: String },

    /// A streaming connection was interrupted or produced invalid data.
    #[error("{service} stream error: {reason}")]
    StreamError { service: &'static str, reason: String },

    /// A required configuration value is missing from the environment.
    #[error("missing configuration: {key}")]
    MissingConfig { key: &'static str },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdapterError {
    /// Wrap a transport-level [`reqwest::Error`] for the named service.
    pub fn request(service: &'static str, err: reqwest::Error) -> Self {
        Self::RequestFailed {
            service,
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;
