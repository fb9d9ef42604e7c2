//! Batch audio transcription seam.
//!
//! The session loop normally consumes a continuous transcript-fragment
//! stream produced by the capture layer, but capture can also run in
//! timed-blob mode: record a short clip, transcribe it, feed the text in.
//! [`Transcriber`] is that seam; [`LlmTranscriber`] implements it by
//! sending the audio inline to the same model API the rest of the crate
//! uses.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::LlmConfig;

use super::client::LlmError;

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Async trait for audio-blob transcription backends.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one audio clip.
    ///
    /// * `base64_audio` - the clip, already base64 encoded by the capture
    ///   layer (the encoding the wire uses, so no re-encode happens here).
    /// * `mime_type` - e.g. `"audio/webm"` or `"audio/wav"`.
    async fn transcribe(&self, base64_audio: &str, mime_type: &str) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// LlmTranscriber
// ---------------------------------------------------------------------------

/// Transcribes audio by sending it inline to the model API.
pub struct LlmTranscriber {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmTranscriber {
    /// Build a transcriber from application config.
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
}

#[async_trait]
impl Transcriber for LlmTranscriber {
    async fn transcribe(&self, base64_audio: &str, mime_type: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": "Transcribe the following audio recording accurately." },
                    { "inlineData": { "mimeType": mime_type, "data": base64_audio } }
                ]
            }]
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_deref().unwrap_or(""))])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
