//! HTTP surface for Triage.
//!
//! Thin by design: every route parses a request, calls the orchestrator, and
//! shapes the result.  No turn logic lives in this crate.
//!
//! - `POST /chat/reasoned` — run one turn, return the final state shape.
//! - `POST /chat/reasoned/stream` — the same turn as SSE events, terminated
//!   by a `[DONE]` sentinel.
//! - `POST /chat/reset` — clear a session's transcript.
//! - `GET /api/status` — health and version probe.

pub mod api;
pub mod server;
pub mod state;

pub use server::WebServer;
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl WebConfig {
    /// Read `TRIAGE_BIND_ADDR` and `TRIAGE_PORT`, falling back to the
    /// defaults where unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let bind_addr = std::env::var("TRIAGE_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = std::env::var("TRIAGE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        Self { bind_addr, port }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_locally() {
        let config = WebConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.port, 8000);
    }
}
