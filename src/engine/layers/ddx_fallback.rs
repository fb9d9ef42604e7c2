//! Stage 4: universal differential-diagnosis fallback.

use crate::engine::context::ReasoningContext;
use crate::engine::result::StructuredKind;

use super::domain::output_contract;
use super::Layer;

/// Phrases that mark a message as a differential-diagnosis request.
/// Matched case-insensitively against the user message.
static DDX_CUES: &[&str] = &[
    "differential diagnosis",
    "differential diagnoses",
    "differentials",
    "ddx",
    "what could this be",
    "what could it be",
    "possible causes",
    "potential causes",
    "possible diagnoses",
    "list of potential diagnoses",
];

/// Ensures a diagnostic question gets structured output even in general
/// chat: when no structured kind has been decided yet and the message
/// matches a diagnostic cue, inject the same contract the dedicated
/// differential-diagnosis tool uses.
pub struct DiagnosticFallbackLayer;

impl DiagnosticFallbackLayer {
    fn is_diagnostic_request(message: &str) -> bool {
        let lower = message.to_lowercase();
        DDX_CUES.iter().any(|cue| lower.contains(cue))
    }
}

impl Layer for DiagnosticFallbackLayer {
    fn name(&self) -> &'static str {
        "diagnostic-fallback"
    }

    fn apply(&self, ctx: &mut ReasoningContext) -> String {
        if ctx.structured_kind.is_some() {
            return "skipped (structured kind already decided)".into();
        }
        if !Self::is_diagnostic_request(&ctx.user_message) {
            return "not triggered".into();
        }

        ctx.system_instruction.push_str(
            "\n\n## Universal Diagnostic Protocol\n\
             The user is asking for a differential diagnosis without having \
             selected the dedicated mode. Apply the same rigor as that mode.",
        );
        ctx.system_instruction.push_str(output_contract(StructuredKind::Ddx));
        ctx.structured_kind = Some(StructuredKind::Ddx);

        "universal ddx contract injected".into()
    }
}
