//! The spoken-answer path and clinical note generation.
//!
//! When the wake word diverts an utterance, the remainder becomes a direct
//! question: answered concisely by the LLM, then synthesized to audio for
//! playback.  Neither step may take the session down; an LLM failure
//! becomes a spoken apology and a synthesis failure simply drops the audio
//! (the text is still shown).
//!
//! Note generation shares this component because it uses the same
//! client and profile: a SOAP-format markdown draft over the finalized
//! transcript, produced on demand.

use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::context::DoctorProfile;
use crate::llm::{ChatRequest, LlmClient, LlmError, SpeechSynthesizer};

// ---------------------------------------------------------------------------
// SpokenAnswer
// ---------------------------------------------------------------------------

/// The assistant's reply to a wake-word question.
#[derive(Debug, Clone, PartialEq)]
pub struct SpokenAnswer {
    /// The answer text (also shown in the UI).
    pub text: String,
    /// Base64 MP3 for playback; `None` when synthesis failed or was
    /// unavailable, in which case the session resumes without audio.
    pub audio_b64: Option<String>,
}

// ---------------------------------------------------------------------------
// SpokenResponder trait
// ---------------------------------------------------------------------------

/// Async trait for the session controller's spoken-answer and note seams.
#[async_trait]
pub trait SpokenResponder: Send + Sync {
    /// Answer a direct question, never failing (degrades to an apology).
    async fn answer(&self, question: &str) -> SpokenAnswer;

    /// Draft a SOAP-format clinical note over the rendered transcript.
    async fn clinical_note(&self, transcript: &str) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// VoiceAssistant
// ---------------------------------------------------------------------------

const APOLOGY: &str = "I'm sorry, I encountered an error trying to answer that question.";

/// LLM + TTS implementation of [`SpokenResponder`].
pub struct VoiceAssistant {
    client: Arc<dyn LlmClient>,
    tts: Arc<dyn SpeechSynthesizer>,
    doctor: DoctorProfile,
    language: String,
    language_code: String,
}

impl VoiceAssistant {
    pub fn new(
        client: Arc<dyn LlmClient>,
        tts: Arc<dyn SpeechSynthesizer>,
        doctor: DoctorProfile,
        language: impl Into<String>,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            client,
            tts,
            doctor,
            language: language.into(),
            language_code: language_code.into(),
        }
    }

    fn answer_instruction(&self) -> String {
        format!(
            "You are Asha, an expert clinical AI assistant for a doctor with \
             a {} degree. The doctor has asked you a direct question by voice \
             during a live patient consultation. Answer clearly, accurately \
             and very concisely; get straight to the point, because your \
             response will be read aloud. Your response must be in {}.",
            self.doctor.qualification.label(),
            self.language
        )
    }

    fn note_instruction(&self) -> String {
        format!(
            "You are Asha, a clinical documentation assistant for a doctor \
             with a {} degree. Draft a clinical note in SOAP format \
             (Subjective, Objective, Assessment, Plan) from the consultation \
             transcript, in Markdown with one heading per section. Include \
             only information present in the transcript; leave a section \
             empty rather than inventing findings. Your response must be in \
             {}.",
            self.doctor.qualification.label(),
            self.language
        )
    }
}

#[async_trait]
impl SpokenResponder for VoiceAssistant {
    async fn answer(&self, question: &str) -> SpokenAnswer {
        let text = match self
            .client
            .generate(ChatRequest::new(self.answer_instruction(), question))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                log::warn!("spoken answer failed, replying with apology: {e}");
                APOLOGY.to_string()
            }
        };

        let audio_b64 = match self.tts.synthesize(&text, &self.language_code).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                log::warn!("speech synthesis failed, continuing without audio: {e}");
                None
            }
        };

        SpokenAnswer { text, audio_b64 }
    }

    async fn clinical_note(&self, transcript: &str) -> Result<String, LlmError> {
        self.client
            .generate(ChatRequest::new(self.note_instruction(), transcript))
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
