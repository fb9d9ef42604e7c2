//! Core `LlmClient` trait and the `GeminiClient` implementation.
//!
//! `GeminiClient` talks to the `generateContent` / `streamGenerateContent`
//! REST surface. All connection details come from [`LlmConfig`]; nothing is
//! hardcoded.
//!
//! Two request shapes cover every caller in the crate:
//!
//! * [`LlmClient::generate`] - single-shot, used for schema-constrained
//!   JSON (structured tools, diarization, insights) and short free-text
//!   answers (spoken replies, clinical notes).
//! * [`LlmClient::stream`] - server-sent-event streaming for chat turns;
//!   text increments are forwarded in arrival order and citation metadata
//!   is collected and delivered once at stream end.
//!
//! A request never carries both a response schema and the search-grounding
//! tool; [`ChatRequest::body`] enforces the exclusion.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::LlmConfig;
use crate::engine::context::ChatTurn;
use crate::engine::result::Citation;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur talking to the LLM API.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatRequest
// ---------------------------------------------------------------------------

/// One fully assembled model request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The system instruction produced by the prompt pipeline.
    pub system_instruction: String,
    /// Prior conversation turns, oldest first.
    pub history: Vec<ChatTurn>,
    /// The new user message.
    pub message: String,
    /// Response schema for JSON-constrained requests.
    pub response_schema: Option<Value>,
    /// Attach the web-search grounding tool.  Ignored (and asserted
    /// against) when a response schema is set; the two are mutually
    /// exclusive.
    pub use_search_grounding: bool,
}

impl ChatRequest {
    /// A plain free-text request with no history.
    pub fn new(system_instruction: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            history: Vec::new(),
            message: message.into(),
            response_schema: None,
            use_search_grounding: false,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_search_grounding(mut self, enabled: bool) -> Self {
        self.use_search_grounding = enabled;
        self
    }

    /// Build the JSON request body.
    ///
    /// `temperature` comes from config; the schema, when present, switches
    /// the response MIME type to JSON and suppresses the grounding tool.
    pub fn body(&self, temperature: f32) -> Value {
        debug_assert!(
            !(self.response_schema.is_some() && self.use_search_grounding),
            "a request must not combine a response schema with search grounding"
        );

        let mut contents: Vec<Value> = self
            .history
            .iter()
            .map(|turn| {
                json!({
                    "role": turn.role.wire_label(),
                    "parts": [{ "text": turn.text }]
                })
            })
            .collect();
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": self.message }]
        }));

        let mut body = json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] },
            "generationConfig": { "temperature": temperature }
        });

        if let Some(schema) = &self.response_schema {
            body["generationConfig"]["responseMimeType"] = json!("application/json");
            body["generationConfig"]["responseSchema"] = schema.clone();
        } else if self.use_search_grounding {
            body["tools"] = json!([{ "google_search": {} }]);
        }

        body
    }
}

// ---------------------------------------------------------------------------
// StreamEvent
// ---------------------------------------------------------------------------

/// One increment of a streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A text chunk, in arrival order.
    TextChunk(String),
    /// Citations collected from grounding metadata; sent once, after the
    /// final text chunk, and only when non-empty.
    Citations(Vec<Citation>),
}

// ---------------------------------------------------------------------------
// LlmClient trait
// ---------------------------------------------------------------------------

/// Async trait implemented by all LLM backends.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn LlmClient>`).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Issue `request` and return the complete response text.
    async fn generate(&self, request: ChatRequest) -> Result<String, LlmError>;

    /// Issue `request` as a streaming call, forwarding increments over
    /// `tx`.  Returns once the stream is exhausted; a dropped receiver
    /// ends the call early without error.
    async fn stream(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), LlmError>;
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// REST client for the Gemini `generateContent` API family.
pub struct GeminiClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl GeminiClient {
    /// Build a `GeminiClient` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url, self.config.model, method
        )
    }

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or("")
    }

    /// Extract the concatenated candidate text from a non-streaming
    /// response body.
    fn extract_text(value: &Value) -> Option<String> {
        let parts = value["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .concat();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Extract web citations from one streamed chunk's grounding metadata.
    fn extract_citations(value: &Value) -> Vec<Citation> {
        let Some(chunks) = value["candidates"][0]["groundingMetadata"]["groundingChunks"].as_array()
        else {
            return Vec::new();
        };
        chunks
            .iter()
            .filter_map(|c| {
                let uri = c["web"]["uri"].as_str()?;
                let title = c["web"]["title"].as_str()?;
                Some(Citation {
                    uri: uri.to_string(),
                    title: title.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: ChatRequest) -> Result<String, LlmError> {
        let body = request.body(self.config.temperature);

        let response = self
            .client
            .post(self.endpoint("generateContent"))
            .query(&[("key", self.api_key())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Self::extract_text(&value).ok_or(LlmError::EmptyResponse)
    }

    async fn stream(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), LlmError> {
        let body = request.body(self.config.temperature);

        let response = self
            .client
            .post(self.endpoint("streamGenerateContent"))
            .query(&[("alt", "sse"), ("key", self.api_key())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let mut byte_stream = response.bytes_stream();
        let mut pending = String::new();
        let mut citations: Vec<Citation> = Vec::new();

        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk?;
            pending.push_str(&String::from_utf8_lossy(&bytes));

            // Process every complete line; a partial line stays buffered.
            while let Some(pos) = pending.find('\n') {
                let line: String = pending.drain(..=pos).collect();
                let line = line.trim();

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() || data == "[DONE]" {
                    continue;
                }

                let value: Value =
                    serde_json::from_str(data).map_err(|e| LlmError::Parse(e.to_string()))?;

                if let Some(text) = Self::extract_text(&value) {
                    if tx.send(StreamEvent::TextChunk(text)).await.is_err() {
                        // Receiver gone; stop streaming quietly.
                        return Ok(());
                    }
                }

                for citation in Self::extract_citations(&value) {
                    if !citations.iter().any(|c| c.uri == citation.uri) {
                        citations.push(citation);
                    }
                }
            }
        }

        if !citations.is_empty() {
            let _ = tx.send(StreamEvent::Citations(citations)).await;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
