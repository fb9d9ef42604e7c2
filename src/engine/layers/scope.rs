//! Stage 2: credential-aware prescribing-scope limits.

use crate::engine::context::ReasoningContext;

use super::Layer;

const UNVERIFIED_SCOPE: &str = "\
\n\n## Prescribing Scope
The doctor's license has not been verified in this session. Do not provide \
dosing schedules, brand selection or prescription drafting for scheduled or \
controlled medicines. General pharmacology and mechanism questions are fine; \
when a request crosses into prescribing, state that license verification is \
required first.";

/// Restricts prescribing-related claims when the credential is unverified
/// or the qualification lacks full allopathic rights.  Contributes nothing
/// for a verified doctor with full rights.
pub struct CredentialScopeLayer;

impl Layer for CredentialScopeLayer {
    fn name(&self) -> &'static str {
        "credential-scope"
    }

    fn apply(&self, ctx: &mut ReasoningContext) -> String {
        if !ctx.credential_verified {
            ctx.system_instruction.push_str(UNVERIFIED_SCOPE);
            return "prescribing restricted (credential unverified)".into();
        }

        if !ctx.doctor.has_full_allopathic() {
            let qualification = ctx.doctor.qualification.label();
            ctx.system_instruction.push_str(&format!(
                "\n\n## Prescribing Scope\n\
                 The doctor holds a {qualification} degree without full modern-medicine \
                 prescribing rights. Frame treatment guidance within the scope of \
                 their system of practice, and when an allopathic prescription is \
                 clinically indicated, recommend referral to or co-management with \
                 an MBBS colleague rather than drafting the prescription."
            ));
            return format!("allopathic scope limited ({qualification})");
        }

        "no scope restrictions".into()
    }
}
