//! Similarity-search client.
//!
//! Talks to the vector search gateway that fronts the knowledge index (work
//! items and wiki pages embedded offline).  The gateway owns the embedding
//! model; this client only ships text and a result limit.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{AdapterError, Result};
use crate::traits::{KnowledgeItem, SimilaritySearch};

const SERVICE: &str = "similarity-search";

/// Connection settings for the vector search gateway.
#[derive(Debug, Clone)]
pub struct VectorSearchConfig {
    /// Base URL of the gateway.
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl VectorSearchConfig {
    /// Read configuration from `VECTOR_SEARCH_URL` and `VECTOR_SEARCH_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("VECTOR_SEARCH_URL")
            .map_err(|_| AdapterError::MissingConfig { key: "VECTOR_SEARCH_URL" })?;
        let api_key = std::env::var("VECTOR_SEARCH_API_KEY").ok().filter(|k| !k.is_empty());

        Ok(Self {
            base_url,
            api_key,
            timeout_secs: 15,
        })
    }
}

/// HTTP client implementing [`SimilaritySearch`].
#[derive(Debug, Clone)]
pub struct VectorSearchClient {
    config: VectorSearchConfig,
    http: reqwest::Client,
}

impl VectorSearchClient {
    pub fn new(config: VectorSearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdapterError::RequestFailed {
                service: SERVICE,
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl SimilaritySearch for VectorSearchClient {
    async fn search_similar(&self, text: &str, k: usize) -> Result<Vec<KnowledgeItem>> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        debug!(k, "similarity search");

        let mut request = self.http.post(&url).json(&json!({ "text": text, "limit": k }));
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| AdapterError::request(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdapterError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
                detail,
            });
        }

        let body: Value = response.json().await.map_err(|e| AdapterError::InvalidResponse {
            service: SERVICE,
            reason: format!("invalid JSON body: {e}"),
        })?;

        let results = body
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::InvalidResponse {
                service: SERVICE,
                reason: "response has no `results` array".into(),
            })?;

        let items = results
            .iter()
            .take(k)
            .map(|item| serde_json::from_value::<KnowledgeItem>(item.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AdapterError::InvalidResponse {
                service: SERVICE,
                reason: format!("malformed result item: {e}"),
            })?;

        debug!(count = items.len(), "similarity search completed");
        Ok(items)
    }
}
