//! The ambient scribe: live transcription, diarization and insights.
//!
//! # Architecture
//!
//! ```text
//! capture layer ──Fragment──▶ UtteranceBuffer
//!                               │ silence elapsed / cap crossed / stop
//!                               ▼
//!                        WakeWordDetector ──match──▶ SpokenResponder ─▶ TTS
//!                               │ no match
//!                               ▼
//!                        Diarizer (serialized, rolling context)
//!                               ▼
//!                        SessionTranscript ──quiescence──▶ InsightGenerator
//! ```
//!
//! [`SessionController`] owns all of the above and runs them on one event
//! loop; the UI talks to it exclusively through the [`SessionInput`] /
//! [`SessionUpdate`] channels.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clinscribe::config::AppConfig;
//! use clinscribe::llm::{GeminiClient, GoogleTts};
//! use clinscribe::scribe::{
//!     LlmDiarizer, LlmInsightGenerator, SessionController, SessionInput, VoiceAssistant,
//! };
//!
//! # async fn example() {
//! let config = AppConfig::load().unwrap();
//! let client = Arc::new(GeminiClient::from_config(&config.llm));
//! let key = config.llm.api_key.clone().unwrap_or_default();
//!
//! let diarizer = Arc::new(LlmDiarizer::new(client.clone(), config.profile.language.clone()));
//! let insights = Arc::new(LlmInsightGenerator::new(
//!     client.clone(),
//!     config.profile.doctor,
//!     config.profile.language.clone(),
//! ));
//! let assistant = Arc::new(VoiceAssistant::new(
//!     client,
//!     Arc::new(GoogleTts::from_config(&config.tts, key)),
//!     config.profile.doctor,
//!     config.profile.language.clone(),
//!     config.tts.language_code.clone(),
//! ));
//!
//! let (input_tx, input_rx) = tokio::sync::mpsc::channel(32);
//! let (update_tx, mut update_rx) = tokio::sync::mpsc::channel(64);
//! let controller =
//!     SessionController::new(config.scribe, diarizer, insights, assistant, update_tx);
//! tokio::spawn(controller.run(input_rx));
//!
//! input_tx.send(SessionInput::Start).await.unwrap();
//! while let Some(update) = update_rx.recv().await {
//!     println!("{update:?}");
//! }
//! # }
//! ```

pub mod assistant;
pub mod buffer;
pub mod diarizer;
pub mod insights;
pub mod session;
pub mod transcript;
pub mod wake;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use assistant::{SpokenAnswer, SpokenResponder, VoiceAssistant};
pub use buffer::UtteranceBuffer;
pub use diarizer::{Diarizer, DiarizeError, LlmDiarizer, SpeakerSpan};
pub use insights::{
    sort_canonical, InsightBlock, InsightCategory, InsightGenerator, InsightScheduler,
    LlmInsightGenerator,
};
pub use session::{
    CapturePhase, SessionController, SessionInput, SessionState, SessionUpdate,
};
pub use transcript::{SessionTranscript, Speaker, TranscriptEntry};
pub use wake::WakeWordDetector;
