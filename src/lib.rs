//! clinscribe - clinical assistant engine.
//!
//! Two cooperating subsystems:
//!
//! * [`engine`] - the reasoning engine: a safety gate, a layered
//!   prompt-construction chain and a dispatcher that turns model output
//!   into typed results (streamed text with citations, or parsed
//!   structured clinical payloads).
//! * [`scribe`] - the ambient scribe: buffers a live transcript stream
//!   into utterances, diverts wake-word questions to a spoken-answer path,
//!   attributes speech to Doctor/Patient via serialized diarization, and
//!   recomputes background clinical insights on transcript quiescence.
//!
//! Supporting modules: [`llm`] (network seams for the LLM, TTS and
//! transcription services), [`knowledge`] (static protocol reference data)
//! and [`config`] (TOML-persisted settings).
//!
//! The UI, audio capture and markdown rendering live outside this crate;
//! both subsystems communicate with their surroundings over channels of
//! typed events.

pub mod config;
pub mod engine;
pub mod knowledge;
pub mod llm;
pub mod scribe;
