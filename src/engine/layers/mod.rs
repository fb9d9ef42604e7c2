//! The prompt-construction pipeline: an ordered chain of pure stages.
//!
//! Each [`Layer`] owns one concern and may only *append* to the context's
//! system instruction; earlier content is never rewritten or removed.  The
//! chain, not the individual layer, writes the audit entry, so "exactly one
//! audit line per executed stage" holds by construction.
//!
//! Stage order is fixed and later stages assume earlier framing is present:
//!
//! 1. [`PersonaLayer`] - baseline identity, tone, trusted sources, language.
//! 2. [`CredentialScopeLayer`] - prescribing-scope limits from the
//!    verification state and qualification.
//! 3. [`ClinicalDomainLayer`] - active-tool instructions and, for
//!    structured tools, the output contract block.
//! 4. [`DiagnosticFallbackLayer`] - the same differential-diagnosis
//!    contract when no tool is active but the message asks for one.
//! 5. [`KnowledgeGroundingLayer`] - protocol excerpts matched by trigger
//!    phrase.
//!
//! A stage with nothing to contribute appends nothing and degrades
//! silently; it never aborts the chain.

pub mod ddx_fallback;
pub mod domain;
pub mod grounding;
pub mod persona;
pub mod scope;

pub use ddx_fallback::DiagnosticFallbackLayer;
pub use domain::ClinicalDomainLayer;
pub use grounding::KnowledgeGroundingLayer;
pub use persona::PersonaLayer;
pub use scope::CredentialScopeLayer;

use super::context::ReasoningContext;

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// One pure transformation stage in the prompt pipeline.
///
/// Implementations may branch on the active tool, the verification state or
/// the message content, but must not mutate `user_message` or `history`,
/// and must only append to `system_instruction`.
pub trait Layer: Send + Sync {
    /// Stable stage name used in audit entries.
    fn name(&self) -> &'static str;

    /// Apply this stage to `ctx`, returning a short note describing what
    /// was (or was not) contributed.  The chain records the note.
    fn apply(&self, ctx: &mut ReasoningContext) -> String;
}

// ---------------------------------------------------------------------------
// LayerChain
// ---------------------------------------------------------------------------

/// Fixed, ordered list of stages applied to every turn.
///
/// # Example
/// ```rust
/// use clinscribe::engine::context::ContextBuilder;
/// use clinscribe::engine::layers::LayerChain;
///
/// let chain = LayerChain::standard();
/// let ctx = chain.run(ContextBuilder::new("hello").build());
/// assert_eq!(ctx.audit_trail.len(), chain.len());
/// assert!(!ctx.system_instruction.is_empty());
/// ```
pub struct LayerChain {
    layers: Vec<Box<dyn Layer>>,
}

impl LayerChain {
    /// The canonical five-stage chain.
    pub fn standard() -> Self {
        Self {
            layers: vec![
                Box::new(PersonaLayer),
                Box::new(CredentialScopeLayer),
                Box::new(ClinicalDomainLayer),
                Box::new(DiagnosticFallbackLayer),
                Box::new(KnowledgeGroundingLayer),
            ],
        }
    }

    /// Build a chain from an explicit stage list (useful for tests).
    pub fn with_layers(layers: Vec<Box<dyn Layer>>) -> Self {
        Self { layers }
    }

    /// Number of stages in the chain.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` when the chain holds no stages.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run every stage in order, recording one audit entry per stage.
    pub fn run(&self, mut ctx: ReasoningContext) -> ReasoningContext {
        for layer in &self.layers {
            let before = ctx.system_instruction.len();
            let note = layer.apply(&mut ctx);

            // Append-only contract; a violating stage is a programming error.
            debug_assert!(
                ctx.system_instruction.len() >= before,
                "stage {} shrank the system instruction",
                layer.name()
            );

            ctx.audit_trail.push(format!("[{}] {}", layer.name(), note));
        }
        ctx
    }
}

impl Default for LayerChain {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
