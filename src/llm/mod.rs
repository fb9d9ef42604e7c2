//! Network seams for every external model service.
//!
//! This module provides:
//! * [`LlmClient`] - async trait implemented by all LLM backends.
//! * [`GeminiClient`] - REST implementation (single-shot + SSE streaming).
//! * [`ChatRequest`] / [`StreamEvent`] - the request/response shapes.
//! * [`SpeechSynthesizer`] / [`GoogleTts`] - text-to-speech seam.
//! * [`Transcriber`] / [`LlmTranscriber`] - batch audio transcription seam.
//! * [`LlmError`] / [`TtsError`] - error variants per service.
//!
//! Everything downstream (the reasoning engine, the diarizer, the insight
//! generator, the spoken-answer path) depends only on the traits, so tests
//! swap in in-memory doubles and no test ever touches the network.

pub mod client;
pub mod transcriber;
pub mod tts;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ChatRequest, GeminiClient, LlmClient, LlmError, StreamEvent};
pub use transcriber::{LlmTranscriber, Transcriber};
pub use tts::{GoogleTts, SpeechSynthesizer, TtsError};
