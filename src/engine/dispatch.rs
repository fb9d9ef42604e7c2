//! Response dispatch: the finalized context becomes typed result events.
//!
//! [`ResponseDispatcher`] owns the decision between the two request shapes:
//!
//! * **Structured** (`structured_kind` set): one schema-constrained
//!   single-shot request.  The JSON is accumulated completely and parsed
//!   once; partial JSON is never forwarded because it is not safely
//!   renderable.  A parse failure becomes a generic [`ChatEvent::Error`],
//!   never a guessed payload.
//! * **Free text**: a streaming request, optionally with search grounding
//!   when the message matches a recency heuristic.  Text increments are
//!   forwarded in arrival order; citations are emitted once at stream end.
//!
//! Grounding and a response schema are never requested together.  All
//! transport and parse errors are converted to [`ChatEvent::Error`] here;
//! nothing is thrown past this boundary.
//!
//! [`ReasoningEngine`] is the single entry point for a chat turn: safety
//! gate, context construction, the prompt chain, then dispatch.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::knowledge::KnowledgeBase;
use crate::llm::{ChatRequest, LlmClient, StreamEvent};

use super::context::{ChatTurn, ContextBuilder, DoctorProfile, ReasoningContext};
use super::layers::LayerChain;
use super::result::{ChatEvent, StructuredResult};
use super::safety::{SafetyGate, Verdict};
use super::tools::{response_schema, ToolProfile};

// ---------------------------------------------------------------------------
// Grounding heuristic
// ---------------------------------------------------------------------------

/// Keywords that mark a message as needing fresh web information.
static GROUNDING_KEYWORDS: &[&str] = &[
    "latest",
    "recent",
    "news",
    "guidelines",
    "statistics",
    "current events",
];

/// Returns `true` when `message` should be answered with search grounding.
pub(crate) fn wants_grounding(message: &str) -> bool {
    let lower = message.to_lowercase();
    GROUNDING_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

// ---------------------------------------------------------------------------
// User-facing error messages
// ---------------------------------------------------------------------------

const PARSE_ERROR_MESSAGE: &str =
    "The structured response could not be read. Please try again.";
const TRANSPORT_ERROR_MESSAGE: &str =
    "Could not reach the assistant service. Please check your connection and try again.";

// ---------------------------------------------------------------------------
// ResponseDispatcher
// ---------------------------------------------------------------------------

/// Issues the model call for a finalized context and maps the raw output
/// into [`ChatEvent`]s.
pub struct ResponseDispatcher {
    client: Arc<dyn LlmClient>,
}

impl ResponseDispatcher {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Dispatch `ctx`, emitting result fragments over `tx`.
    ///
    /// Never panics and never returns an error; every failure is emitted
    /// as a [`ChatEvent::Error`].
    pub async fn dispatch(&self, ctx: ReasoningContext, tx: mpsc::Sender<ChatEvent>) {
        match ctx.structured_kind {
            Some(kind) => self.dispatch_structured(ctx, kind, tx).await,
            None => self.dispatch_text(ctx, tx).await,
        }
    }

    /// Schema-constrained single request, parsed once on completion.
    async fn dispatch_structured(
        &self,
        ctx: ReasoningContext,
        kind: super::result::StructuredKind,
        tx: mpsc::Sender<ChatEvent>,
    ) {
        let request = ChatRequest {
            system_instruction: ctx.system_instruction,
            history: ctx.history,
            message: ctx.user_message,
            response_schema: Some(response_schema(kind)),
            // Grounding is not compatible with JSON mode.
            use_search_grounding: false,
        };

        match self.client.generate(request).await {
            Ok(raw) => match StructuredResult::parse(kind, &raw) {
                Ok(result) => {
                    let _ = tx.send(ChatEvent::Structured(result)).await;
                }
                Err(e) => {
                    log::error!("structured response parse failed ({kind}): {e}");
                    let _ = tx
                        .send(ChatEvent::Error {
                            message: PARSE_ERROR_MESSAGE.into(),
                        })
                        .await;
                }
            },
            Err(e) => {
                log::error!("structured dispatch failed ({kind}): {e}");
                let _ = tx
                    .send(ChatEvent::Error {
                        message: TRANSPORT_ERROR_MESSAGE.into(),
                    })
                    .await;
            }
        }
    }

    /// Streaming free-text request; increments forwarded in arrival order.
    async fn dispatch_text(&self, ctx: ReasoningContext, tx: mpsc::Sender<ChatEvent>) {
        let grounding = wants_grounding(&ctx.user_message);
        let request = ChatRequest {
            system_instruction: ctx.system_instruction,
            history: ctx.history,
            message: ctx.user_message,
            response_schema: None,
            use_search_grounding: grounding,
        };

        let (event_tx, mut event_rx) = mpsc::channel::<StreamEvent>(32);
        let client = Arc::clone(&self.client);
        let call = tokio::spawn(async move { client.stream(request, event_tx).await });

        while let Some(event) = event_rx.recv().await {
            let mapped = match event {
                StreamEvent::TextChunk(text) => ChatEvent::TextChunk(text),
                StreamEvent::Citations(citations) => ChatEvent::Citations(citations),
            };
            if tx.send(mapped).await.is_err() {
                // UI went away; abandon the turn quietly.
                call.abort();
                return;
            }
        }

        match call.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("streaming dispatch failed: {e}");
                let _ = tx
                    .send(ChatEvent::Error {
                        message: TRANSPORT_ERROR_MESSAGE.into(),
                    })
                    .await;
            }
            Err(e) => {
                log::error!("streaming task join failed: {e}");
                let _ = tx
                    .send(ChatEvent::Error {
                        message: TRANSPORT_ERROR_MESSAGE.into(),
                    })
                    .await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ReasoningEngine
// ---------------------------------------------------------------------------

/// One chat turn's request parameters.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// The new user message.
    pub message: String,
    /// Conversation so far, oldest first.
    pub history: Vec<ChatTurn>,
    /// Selected tool, when the chat runs in a specialized mode.
    pub tool: Option<ToolProfile>,
    /// Whether the clinician's license is verified this session.
    pub credential_verified: bool,
}

/// The complete request pipeline behind one `respond` call:
/// safety gate, context construction, prompt chain, dispatch.
pub struct ReasoningEngine {
    dispatcher: ResponseDispatcher,
    chain: LayerChain,
    knowledge: Arc<KnowledgeBase>,
    doctor: DoctorProfile,
    language: String,
}

impl ReasoningEngine {
    pub fn new(
        client: Arc<dyn LlmClient>,
        knowledge: Arc<KnowledgeBase>,
        doctor: DoctorProfile,
        language: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher: ResponseDispatcher::new(client),
            chain: LayerChain::standard(),
            knowledge,
            doctor,
            language: language.into(),
        }
    }

    /// Run one chat turn, emitting result fragments over `tx`.
    ///
    /// When the safety gate denies the request, a single
    /// [`ChatEvent::VerificationRequired`] is emitted carrying the held
    /// message, and no model call is made.
    pub async fn respond(&self, turn: TurnRequest, tx: mpsc::Sender<ChatEvent>) {
        if let Verdict::Deny { reason } = SafetyGate::check(&turn.message, turn.credential_verified)
        {
            log::info!("turn blocked before dispatch: {reason}");
            let _ = tx
                .send(ChatEvent::VerificationRequired {
                    pending_message: turn.message,
                })
                .await;
            return;
        }

        let ctx = ContextBuilder::new(turn.message)
            .history(turn.history)
            .tool(turn.tool)
            .doctor(self.doctor)
            .verified(turn.credential_verified)
            .language(self.language.clone())
            .knowledge(Arc::clone(&self.knowledge))
            .build();

        let ctx = self.chain.run(ctx);
        log::debug!("prompt chain complete: {:?}", ctx.audit_trail);

        self.dispatcher.dispatch(ctx, tx).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
