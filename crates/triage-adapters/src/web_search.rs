//! Web-search client (Tavily wire format).
//!
//! Used as a last resort when the completion service has nothing useful to
//! say.  Returns one short answer and the URL it came from; ranking and
//! snippet quality are the search provider's problem.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{AdapterError, Result};
use crate::traits::{WebAnswer, WebSearch};

const SERVICE: &str = "web-search";

/// Default API endpoint.
const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

/// Connection settings for the web-search provider.
#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl WebSearchConfig {
    /// Read configuration from `TAVILY_API_KEY` (and optionally
    /// `TAVILY_ENDPOINT` for self-hosted gateways).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| AdapterError::MissingConfig { key: "TAVILY_API_KEY" })?;
        let endpoint = std::env::var("TAVILY_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_owned());

        Ok(Self {
            endpoint,
            api_key,
            timeout_secs: 20,
        })
    }
}

/// HTTP client implementing [`WebSearch`].
#[derive(Debug, Clone)]
pub struct TavilySearchClient {
    config: WebSearchConfig,
    http: reqwest::Client,
}

impl TavilySearchClient {
    pub fn new(config: WebSearchConfig) -> Result<Self> {
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
impl WebSearch for TavilySearchClient {
    async fn search(&self, query: &str) -> Result<WebAnswer> {
        debug!("web search");

        let body = json!({
            "api_key": self.config.api_key,
            "query": query,
            "max_results": 1,
            "include_answer": true,
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::request(SERVICE, e))?;

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

        Ok(answer_from_response(&body))
    }
}

/// Prefer the provider's synthesized answer; fall back to the top result's
/// content snippet.
fn answer_from_response(body: &Value) -> WebAnswer {
    let top = body.pointer("/results/0");

    let text = body
        .get("answer")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| top.and_then(|t| t.get("content")).and_then(Value::as_str))
        .unwrap_or_default()
        .trim()
        .to_owned();

    let source = top
        .and_then(|t| t.get("url"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from);

    WebAnswer { text, source }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_prefers_synthesized_answer() {
        let body = json!({
            "answer": "Rust 1.91 shipped in October.",
            "results": [{ "content": "long snippet", "url": "https://blog.rust-lang.org" }]
        });
        let answer = answer_from_response(&body);
        assert_eq!(answer.text, "Rust 1.91 shipped in October.");
        assert_eq!(answer.source.as_deref(), Some("https://blog.rust-lang.org"));
    }

    #[test]
    fn answer_falls_back_to_top_result_content() {
        let body = json!({
            "answer": "",
            "results": [{ "content": "snippet text", "url": "https://example.com" }]
        });
        let answer = answer_from_response(&body);
        assert_eq!(answer.text, "snippet text");
    }

    #[test]
    fn answer_handles_empty_results() {
        let answer = answer_from_response(&json!({ "results": [] }));
        assert!(answer.text.is_empty());
        assert!(answer.source.is_none());
    }
}
