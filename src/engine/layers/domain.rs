//! Stage 3: clinical-domain priors for the active tool.

use crate::engine::context::ReasoningContext;
use crate::engine::result::StructuredKind;

use super::Layer;

/// The in-prompt output contract for a structured kind.
///
/// The dispatcher also constrains the request with a response schema; this
/// block repeats the contract in prose because schema enforcement alone
/// does not stop conversational preambles or out-of-tier confidence labels
/// on every model.
pub(super) fn output_contract(kind: StructuredKind) -> &'static str {
    match kind {
        StructuredKind::Ddx => {
            "\n\n### Output Contract\n\
             Respond with a single JSON object and nothing else. Do NOT write \
             any conversational text or preamble before the JSON. The object \
             must contain: \"summary\" (string), \"diagnoses\" (array of \
             objects with \"diagnosis\", \"rationale\" and \"confidence\") and \
             \"questions\" (array of strings: the key questions that would \
             narrow the differential). \"confidence\" must be exactly one of \
             \"High\", \"Medium\" or \"Low\"; segment the diagnoses across all \
             three tiers where the evidence allows."
        }
        StructuredKind::Lab => {
            "\n\n### Output Contract\n\
             Respond with a single JSON object and nothing else. Do NOT write \
             any conversational text or preamble before the JSON. The object \
             must contain: \"summary\" (string), \"overallInterpretation\" \
             (string) and \"results\" (array of objects with \"parameter\", \
             \"value\", \"referenceRange\", \"interpretation\" and \
             \"urgency\"). \"urgency\" must be exactly one of \"Normal\", \
             \"Abnormal\" or \"Critical\"."
        }
        StructuredKind::Handout => {
            "\n\n### Output Contract\n\
             Respond with a single JSON object and nothing else. Do NOT write \
             any conversational text or preamble before the JSON. The object \
             must contain: \"summary\", \"title\", \"introduction\", \
             \"sections\" (array of objects with \"heading\" and \"content\") \
             and \"disclaimer\". Write the handout body in plain language a \
             patient can understand."
        }
        StructuredKind::Risk => {
            "\n\n### Output Contract\n\
             Respond with a single JSON object and nothing else. Do NOT write \
             any conversational text or preamble before the JSON. The object \
             must contain: \"summary\", \"riskLevel\" (exactly one of \"Low\", \
             \"Moderate\" or \"High\"), \"riskFactors\" (array of strings) and \
             \"recommendations\" (array of strings)."
        }
    }
}

/// Injects the active tool's framing and, for structured tools, its output
/// contract; records the decided [`StructuredKind`] on the context.
/// Contributes nothing in general chat.
pub struct ClinicalDomainLayer;

impl Layer for ClinicalDomainLayer {
    fn name(&self) -> &'static str {
        "clinical-domain"
    }

    fn apply(&self, ctx: &mut ReasoningContext) -> String {
        let Some(tool) = ctx.active_tool else {
            return "no tool selected".into();
        };

        ctx.system_instruction.push_str(&format!(
            "\n\n## Clinical Domain Context\n\
             This is a specialized session for: \"{}\". {} \
             Focus your reasoning and response entirely within this clinical \
             domain.",
            tool.title, tool.description
        ));

        match tool.structured {
            Some(kind) => {
                ctx.system_instruction.push_str(output_contract(kind));
                ctx.structured_kind = Some(kind);
                format!("tool '{}' framing and {kind} contract injected", tool.id)
            }
            None => format!("tool '{}' framing injected", tool.id),
        }
    }
}
