//! Text-to-speech seam for the spoken-answer path.
//!
//! [`SpeechSynthesizer`] is the trait the session loop depends on;
//! [`GoogleTts`] implements it against the Cloud Text-to-Speech REST API.
//! Synthesis returns the MP3 payload as base64 (the transport encoding the
//! API already uses) so the UI can hand it straight to an audio element
//! without a decode step.
//!
//! Synthesis failure is never fatal: callers log it and resume the session
//! without audio playback.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::TtsConfig;

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

/// Errors that can occur during speech synthesis.
#[derive(Debug, Error)]
pub enum TtsError {
    /// HTTP transport or connection error.
    #[error("TTS request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("TTS request timed out")]
    Timeout,

    /// The response did not contain an audio payload.
    #[error("TTS returned no audio content")]
    NoAudio,
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Async trait for text-to-speech backends.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` in `language_code` (BCP-47), returning base64 MP3.
    async fn synthesize(&self, text: &str, language_code: &str) -> Result<String, TtsError>;
}

// ---------------------------------------------------------------------------
// GoogleTts
// ---------------------------------------------------------------------------

/// Cloud Text-to-Speech REST client.
pub struct GoogleTts {
    client: reqwest::Client,
    config: TtsConfig,
    api_key: String,
}

impl GoogleTts {
    /// Build a client from the TTS config and the shared API key.
    pub fn from_config(config: &TtsConfig, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, language_code: &str) -> Result<String, TtsError> {
        let url = format!("{}/v1/text:synthesize", self.config.base_url);

        let body = json!({
            "input": { "text": text },
            "voice": { "languageCode": language_code },
            "audioConfig": { "audioEncoding": "MP3" }
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| TtsError::Request(e.to_string()))?;

        value["audioContent"]
            .as_str()
            .filter(|content| !content.is_empty())
            .map(|content| content.to_string())
            .ok_or(TtsError::NoAudio)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
