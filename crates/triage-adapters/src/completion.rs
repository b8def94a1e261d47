//! Chat-completion client for OpenAI-compatible endpoints.
//!
//! Speaks the Chat Completions wire format, which also covers self-hosted
//! gateways (Ollama, vLLM, Together).  Supports both one-shot completions
//! and SSE streaming; streamed chunks are forwarded in generation order and
//! the stream closes after the `[DONE]` sentinel.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{AdapterError, Result};
use crate::traits::{CompletionService, CompletionStream};

/// Service name used in error variants and logs.
const SERVICE: &str = "completion";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for the completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL up to but not including `/chat/completions`.
    pub base_url: String,
    /// Bearer token; may be empty for unauthenticated local gateways.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl CompletionConfig {
    /// Read configuration from `COMPLETION_BASE_URL`, `COMPLETION_API_KEY`,
    /// and `COMPLETION_MODEL`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("COMPLETION_BASE_URL")
            .map_err(|_| AdapterError::MissingConfig { key: "COMPLETION_BASE_URL" })?;
        let model = std::env::var("COMPLETION_MODEL")
            .map_err(|_| AdapterError::MissingConfig { key: "COMPLETION_MODEL" })?;
        let api_key = std::env::var("COMPLETION_API_KEY").unwrap_or_default();

        Ok(Self {
            base_url,
            api_key,
            model,
            max_tokens: 1024,
            timeout_secs: 60,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client implementing [`CompletionService`].
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    config: CompletionConfig,
    http: reqwest::Client,
}

impl ChatCompletionClient {
    /// Create a new client.  The request timeout is applied at the HTTP
    /// client level so a hung endpoint cannot stall a turn indefinitely.
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdapterError::RequestFailed {
                service: SERVICE,
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn body(&self, system: Option<&str>, user: &str, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": user }));

        json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "stream": stream,
        })
    }

    async fn post(&self, body: Value) -> Result<reqwest::Response> {
        let mut request = self.http.post(self.endpoint()).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
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
        Ok(response)
    }
}

#[async_trait]
impl CompletionService for ChatCompletionClient {
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        debug!(model = %self.config.model, "requesting completion");
        let response = self.post(self.body(system, user, false)).await?;

        let body: Value = response.json().await.map_err(|e| AdapterError::InvalidResponse {
            service: SERVICE,
            reason: format!("invalid JSON body: {e}"),
        })?;

        let text = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::InvalidResponse {
                service: SERVICE,
                reason: "response has no choices[0].message.content".into(),
            })?;

        Ok(text.trim().to_owned())
    }

    async fn complete_stream(&self, system: Option<&str>, user: &str) -> Result<CompletionStream> {
        debug!(model = %self.config.model, "requesting streamed completion");
        let response = self.post(self.body(system, user, true)).await?;

        let (tx, rx) = futures::channel::mpsc::unbounded();
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut lines = SseLineBuffer::default();

            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.unbounded_send(Err(AdapterError::StreamError {
                            service: SERVICE,
                            reason: e.to_string(),
                        }));
                        break;
                    }
                };

                for line in lines.feed(&chunk) {
                    match parse_stream_line(&line) {
                        StreamLine::Delta(text) => {
                            // Receiver dropped means the caller cancelled;
                            // stop reading from the endpoint.
                            if tx.unbounded_send(Ok(text)).is_err() {
                                break 'outer;
                            }
                        }
                        StreamLine::Done => break 'outer,
                        StreamLine::Skip => {}
                    }
                }
            }
        });

        Ok(rx.boxed())
    }
}

// ---------------------------------------------------------------------------
// SSE plumbing
// ---------------------------------------------------------------------------

/// Reassembles SSE lines from arbitrary byte chunks.
///
/// Chunk boundaries do not respect line boundaries, so a partial trailing
/// line is carried over to the next `feed` call.
#[derive(Debug, Default)]
struct SseLineBuffer {
    pending: String,
}

impl SseLineBuffer {
    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            lines.push(line.trim_end_matches(['\n', '\r']).to_owned());
        }
        lines
    }
}

/// The meaning of one parsed SSE line.
enum StreamLine {
    /// A text chunk to forward.
    Delta(String),
    /// Terminal sentinel; no more chunks follow.
    Done,
    /// Comment, keep-alive, empty delta, or blank line.
    Skip,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.strip_prefix("data: ") else {
        return StreamLine::Skip;
    };

    if data.trim() == "[DONE]" {
        return StreamLine::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(v) => {
            let text = v
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if text.is_empty() {
                StreamLine::Skip
            } else {
                StreamLine::Delta(text.to_owned())
            }
        }
        Err(e) => {
            warn!(error = %e, "ignoring malformed SSE data line");
            StreamLine::Skip
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
