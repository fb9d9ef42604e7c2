//! Stage 5: knowledge-base protocol grounding.

use crate::engine::context::ReasoningContext;

use super::Layer;

/// Appends protocol excerpts whose trigger phrases appear in the user
/// message.  With no match it contributes nothing; a missing protocol is
/// never a reason to abort the turn.
pub struct KnowledgeGroundingLayer;

impl Layer for KnowledgeGroundingLayer {
    fn name(&self) -> &'static str {
        "knowledge-grounding"
    }

    fn apply(&self, ctx: &mut ReasoningContext) -> String {
        let hits = ctx.knowledge.matching(&ctx.user_message);
        if hits.is_empty() {
            return "no matching protocols".into();
        }

        let ids: Vec<&str> = hits.iter().map(|p| p.id).collect();

        let mut block = String::from(
            "\n\n## Protocol Grounding\n\
             The following protocol excerpts are authoritative for this \
             query. Base stepwise management and dosing on them, and cite \
             the protocol id when you do.\n",
        );
        for protocol in &hits {
            block.push('\n');
            block.push_str(protocol.excerpt);
            block.push('\n');
        }
        ctx.system_instruction.push_str(&block);

        format!("protocols injected: {}", ids.join(", "))
    }
}
