//! Shared application state for the web server.

use std::sync::Arc;

use triage_engine::Orchestrator;

/// State accessible from every Axum handler, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The turn orchestrator serving all sessions.
    pub orchestrator: Arc<Orchestrator>,
}
