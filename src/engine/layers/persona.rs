//! Stage 1: baseline persona, jurisdiction framing and language.

use crate::engine::context::ReasoningContext;
use crate::knowledge::TRUSTED_SOURCES;

use super::Layer;

const BASE_INSTRUCTION: &str = "\
You are Asha, a clinical AI assistant for practicing doctors in India. \
Be clear, professional and concise. Format your answers using Markdown \
for clarity, including lists, bold text and headings where appropriate.";

/// Sets the assistant's identity, the professional tone derived from the
/// doctor's qualification, the trusted-source digest and the response
/// language.  Always contributes; every later stage assumes this framing.
pub struct PersonaLayer;

impl Layer for PersonaLayer {
    fn name(&self) -> &'static str {
        "persona"
    }

    fn apply(&self, ctx: &mut ReasoningContext) -> String {
        let qualification = ctx.doctor.qualification.label();

        ctx.system_instruction.push_str(BASE_INSTRUCTION);
        ctx.system_instruction.push_str(&format!(
            "\n\nYou are assisting a doctor with a {qualification} degree. \
             Provide evidence-based information, use precise medical \
             terminology, and reference Indian clinical guidelines where \
             possible. Always remind the user to apply their own clinical \
             judgment; you support decisions, you do not make them."
        ));
        ctx.system_instruction.push_str("\n\n");
        ctx.system_instruction.push_str(TRUSTED_SOURCES);
        ctx.system_instruction.push_str(&format!(
            "\n\nAll your responses must be in {}.",
            ctx.language
        ));

        format!("baseline persona set ({qualification}, language: {})", ctx.language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::{ContextBuilder, DoctorProfile, PrescribingRights, Qualification};

    #[test]
    fn injects_identity_sources_and_language() {
        let mut ctx = ContextBuilder::new("hi").language("Marathi").build();
        let note = PersonaLayer.apply(&mut ctx);

        assert!(ctx.system_instruction.contains("You are Asha"));
        assert!(ctx.system_instruction.contains("Trusted Indian & Global Health Data Sources"));
        assert!(ctx.system_instruction.contains("must be in Marathi"));
        assert!(note.contains("Marathi"));
    }

    #[test]
    fn names_the_doctors_qualification() {
        let mut ctx = ContextBuilder::new("hi")
            .doctor(DoctorProfile {
                qualification: Qualification::Mbbs,
                prescribing: PrescribingRights::Full,
            })
            .build();
        PersonaLayer.apply(&mut ctx);
        assert!(ctx.system_instruction.contains("MBBS degree"));
    }
}
