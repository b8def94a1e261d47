//! Web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers the chat routes, and
//! starts the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use triage_engine::Orchestrator;

use crate::WebConfig;
use crate::api;
use crate::state::AppState;

/// The Triage web server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: WebConfig, orchestrator: Arc<Orchestrator>) -> Self {
        let state = Arc::new(AppState { orchestrator });
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin("*".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(tower_http::cors::Any);

        Router::new()
            .route("/chat/reasoned", post(api::chat))
            .route("/chat/reasoned/stream", post(api::chat_stream))
            .route("/chat/reset", post(api::reset))
            .route("/api/status", get(api::status))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let router = self.router();

        tracing::info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
