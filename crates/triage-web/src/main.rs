//! Server entry point.
//!
//! Builds the production collaborator clients from the environment, wires
//! them into the orchestrator, and serves the HTTP surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use triage_adapters::{
    AzureBoardsClient, ChatCompletionClient, CompletionConfig, TavilySearchClient, TrackerConfig,
    VectorSearchClient, VectorSearchConfig, WebSearchConfig,
};
use triage_engine::Orchestrator;
use triage_web::{WebConfig, WebServer};

#[tokio::main]
async fn main() -> Result<()> {
    // A .env file is optional; the environment itself may carry the config.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let completion = ChatCompletionClient::new(
        CompletionConfig::from_env().context("completion service configuration")?,
    )?;
    let similarity = VectorSearchClient::new(
        VectorSearchConfig::from_env().context("similarity search configuration")?,
    )?;
    let tracker =
        AzureBoardsClient::new(TrackerConfig::from_env().context("tracker configuration")?)?;
    let web_search =
        TavilySearchClient::new(WebSearchConfig::from_env().context("web search configuration")?)?;

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(completion),
        Arc::new(similarity),
        Arc::new(tracker),
        Arc::new(web_search),
    ));

    let server = WebServer::new(WebConfig::from_env(), orchestrator);
    tracing::info!(addr = %server.addr(), "Triage ready");
    server.start().await.map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
