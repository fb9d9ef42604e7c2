//! Speaker diarization of flushed utterances.
//!
//! The diarizer receives one utterance plus a short window of already
//! labeled entries and attributes the text to `Doctor` / `Patient` spans.
//! An utterance that contains turn-taking ("does it hurt here / no lower
//! down") comes back as multiple spans.
//!
//! The wire contract is a bare JSON array: `[{speaker: Doctor|Patient,
//! text}]`.  Attribution failure must never lose transcript content; the
//! session controller inserts the whole utterance under a configured
//! fallback speaker instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::llm::{ChatRequest, LlmClient, LlmError};

use super::transcript::Speaker;

// ---------------------------------------------------------------------------
// SpeakerSpan / DiarizeError
// ---------------------------------------------------------------------------

/// One speaker-attributed span of an utterance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeakerSpan {
    pub speaker: Speaker,
    pub text: String,
}

/// Errors that can occur during diarization.
#[derive(Debug, Error)]
pub enum DiarizeError {
    /// The underlying LLM call failed.
    #[error("diarization request failed: {0}")]
    Transport(#[from] LlmError),

    /// The response was not a well-formed span array.
    #[error("diarization response could not be parsed: {0}")]
    Parse(String),

    /// The model returned an empty span list.
    #[error("diarization returned no spans")]
    Empty,
}

// ---------------------------------------------------------------------------
// Diarizer trait
// ---------------------------------------------------------------------------

/// Async trait for speaker-attribution backends.
///
/// The caller guarantees calls are serialized (one in flight at a time) so
/// `history_context` always reflects every previously attributed span.
#[async_trait]
pub trait Diarizer: Send + Sync {
    /// Attribute `utterance` to speaker spans, in utterance order.
    async fn diarize(
        &self,
        utterance: &str,
        history_context: &str,
    ) -> Result<Vec<SpeakerSpan>, DiarizeError>;
}

// ---------------------------------------------------------------------------
// LlmDiarizer
// ---------------------------------------------------------------------------

/// LLM-backed diarizer using a schema-constrained JSON request.
pub struct LlmDiarizer {
    client: Arc<dyn LlmClient>,
    language: String,
}

impl LlmDiarizer {
    pub fn new(client: Arc<dyn LlmClient>, language: impl Into<String>) -> Self {
        Self {
            client,
            language: language.into(),
        }
    }

    fn system_instruction(&self) -> String {
        format!(
            "You are an expert at speaker diarization for medical \
             consultations. Analyze the transcript chunk, using the provided \
             history for context. Distinguish between the 'Doctor' and the \
             'Patient'. The Doctor uses clinical language, asks questions and \
             provides explanations; the Patient describes symptoms and \
             personal experiences. Your output must be a single JSON array \
             that strictly conforms to the provided schema. Do not output any \
             text other than the JSON. The conversation is in {}.",
            self.language
        )
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "speaker": { "type": "STRING", "enum": ["Doctor", "Patient"] },
                    "text": { "type": "STRING" }
                },
                "required": ["speaker", "text"]
            }
        })
    }
}

#[async_trait]
impl Diarizer for LlmDiarizer {
    async fn diarize(
        &self,
        utterance: &str,
        history_context: &str,
    ) -> Result<Vec<SpeakerSpan>, DiarizeError> {
        let history = if history_context.is_empty() {
            "No history provided."
        } else {
            history_context
        };

        let message = format!(
            "CONTEXTUAL HISTORY:\n{history}\n\nNEW TRANSCRIPT CHUNK TO DIARIZE:\n\"{utterance}\""
        );

        let request =
            ChatRequest::new(self.system_instruction(), message).with_schema(Self::response_schema());

        let raw = self.client.generate(request).await?;

        let spans: Vec<SpeakerSpan> =
            serde_json::from_str(raw.trim()).map_err(|e| DiarizeError::Parse(e.to_string()))?;

        if spans.is_empty() {
            return Err(DiarizeError::Empty);
        }

        Ok(spans)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StreamEvent;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Replies to `generate` with a fixed string and records requests.
    struct CannedLlm {
        reply: String,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl CannedLlm {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn generate(&self, request: ChatRequest) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }

        async fn stream(
            &self,
            _request: ChatRequest,
            _tx: mpsc::Sender<StreamEvent>,
        ) -> Result<(), LlmError> {
            unimplemented!("diarization never streams")
        }
    }

    /// Always fails at the transport level.
    struct DeadLlm;

    #[async_trait]
    impl LlmClient for DeadLlm {
        async fn generate(&self, _request: ChatRequest) -> Result<String, LlmError> {
            Err(LlmError::Timeout)
        }

        async fn stream(
            &self,
            _request: ChatRequest,
            _tx: mpsc::Sender<StreamEvent>,
        ) -> Result<(), LlmError> {
            Err(LlmError::Timeout)
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn parses_spans_from_the_wire_contract() {
        let client = Arc::new(CannedLlm::new(
            r#"[{"speaker": "Doctor", "text": "does it hurt here"},
                {"speaker": "Patient", "text": "no lower down"}]"#,
        ));
        let diarizer = LlmDiarizer::new(client, "English");

        let spans = diarizer
            .diarize("does it hurt here no lower down", "Doctor: tell me more")
            .await
            .expect("valid spans");

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].speaker, Speaker::Doctor);
        assert_eq!(spans[1].speaker, Speaker::Patient);
        assert_eq!(spans[1].text, "no lower down");
    }

    #[tokio::test]
    async fn request_embeds_utterance_history_and_schema() {
        let client = Arc::new(CannedLlm::new(r#"[{"speaker": "Patient", "text": "x"}]"#));
        let diarizer = LlmDiarizer::new(Arc::clone(&client) as Arc<dyn LlmClient>, "Hindi");

        diarizer
            .diarize("it started yesterday", "Doctor: when did it start?")
            .await
            .unwrap();

        let request = client.requests.lock().unwrap()[0].clone();
        assert!(request.message.contains("it started yesterday"));
        assert!(request.message.contains("Doctor: when did it start?"));
        assert!(request.system_instruction.contains("Hindi"));
        assert!(request.response_schema.is_some());
        assert!(!request.use_search_grounding);
    }

    #[tokio::test]
    async fn empty_history_is_announced_as_such() {
        let client = Arc::new(CannedLlm::new(r#"[{"speaker": "Patient", "text": "x"}]"#));
        let diarizer = LlmDiarizer::new(Arc::clone(&client) as Arc<dyn LlmClient>, "English");

        diarizer.diarize("first words", "").await.unwrap();

        let request = client.requests.lock().unwrap()[0].clone();
        assert!(request.message.contains("No history provided."));
    }

    #[tokio::test]
    async fn unparseable_reply_is_a_parse_error() {
        let client = Arc::new(CannedLlm::new("The speakers are probably..."));
        let diarizer = LlmDiarizer::new(client, "English");

        let err = diarizer.diarize("text", "").await.unwrap_err();
        assert!(matches!(err, DiarizeError::Parse(_)));
    }

    #[tokio::test]
    async fn unknown_speaker_label_is_a_parse_error() {
        let client = Arc::new(CannedLlm::new(r#"[{"speaker": "Nurse", "text": "x"}]"#));
        let diarizer = LlmDiarizer::new(client, "English");

        assert!(matches!(
            diarizer.diarize("text", "").await.unwrap_err(),
            DiarizeError::Parse(_)
        ));
    }

    #[tokio::test]
    async fn empty_span_list_is_an_error() {
        let client = Arc::new(CannedLlm::new("[]"));
        let diarizer = LlmDiarizer::new(client, "English");

        assert!(matches!(
            diarizer.diarize("text", "").await.unwrap_err(),
            DiarizeError::Empty
        ));
    }

    #[tokio::test]
    async fn transport_failure_maps_to_transport_error() {
        let diarizer = LlmDiarizer::new(Arc::new(DeadLlm), "English");
        assert!(matches!(
            diarizer.diarize("text", "").await.unwrap_err(),
            DiarizeError::Transport(_)
        ));
    }
}
