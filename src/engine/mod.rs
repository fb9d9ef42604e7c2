//! The reasoning engine: layered prompt orchestration for chat turns.
//!
//! # Architecture
//!
//! ```text
//! TurnRequest
//!   └─▶ SafetyGate ──deny──▶ ChatEvent::VerificationRequired
//!         │ allow
//!         ▼
//!   ContextBuilder ─▶ LayerChain (persona → scope → domain →
//!         │            fallback → grounding)
//!         ▼
//!   ResponseDispatcher
//!         ├─ structured kind set ─▶ schema request ─▶ parse once ─▶
//!         │                         ChatEvent::Structured | Error
//!         └─ free text ──────────▶ streaming request ─▶
//!                                   ChatEvent::TextChunk* Citations?
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clinscribe::config::AppConfig;
//! use clinscribe::engine::{ReasoningEngine, TurnRequest};
//! use clinscribe::knowledge::KnowledgeBase;
//! use clinscribe::llm::GeminiClient;
//!
//! # async fn example() {
//! let config = AppConfig::load().unwrap();
//! let client = Arc::new(GeminiClient::from_config(&config.llm));
//! let engine = ReasoningEngine::new(
//!     client,
//!     Arc::new(KnowledgeBase::standard()),
//!     config.profile.doctor,
//!     config.profile.language.clone(),
//! );
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(32);
//! engine
//!     .respond(
//!         TurnRequest {
//!             message: "ddx for fever and rash?".into(),
//!             history: Vec::new(),
//!             tool: None,
//!             credential_verified: true,
//!         },
//!         tx,
//!     )
//!     .await;
//! while let Some(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! # }
//! ```

pub mod context;
pub mod dispatch;
pub mod layers;
pub mod result;
pub mod safety;
pub mod tools;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use context::{ChatTurn, ContextBuilder, DoctorProfile, ReasoningContext, Role};
pub use dispatch::{ReasoningEngine, ResponseDispatcher, TurnRequest};
pub use layers::{Layer, LayerChain};
pub use result::{ChatEvent, Citation, StructuredKind, StructuredResult};
pub use safety::{SafetyGate, Verdict};
pub use tools::{find_tool, ToolProfile, TOOLS};
