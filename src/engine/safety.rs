//! Pre-dispatch safety gate for controlled-substance queries.
//!
//! [`SafetyGate::check`] runs before any prompt construction or network
//! call.  It is a total, stateless function: the same message and
//! verification state always produce the same verdict.  A denial
//! short-circuits the whole turn; the model is never consulted.

// ---------------------------------------------------------------------------
// Lexicon
// ---------------------------------------------------------------------------

/// Controlled-substance terms that require a verified license before the
/// assistant will discuss dosing or prescribing.
///
/// Matching is case-insensitive substring containment, deliberately broad:
/// a false positive costs one verification prompt, a false negative hands
/// out scheduled-drug guidance unverified.
static CONTROLLED_SUBSTANCES: &[&str] = &[
    "morphine",
    "fentanyl",
    "oxycodone",
    "codeine",
    "diazepam",
    "lorazepam",
    "alprazolam",
    "ketamine",
    "buprenorphine",
];

// ---------------------------------------------------------------------------
// Verdict / SafetyGate
// ---------------------------------------------------------------------------

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The request may proceed to prompt construction and dispatch.
    Allow,
    /// The request must not reach the model; `reason` names the matched
    /// term for logging (it is not shown to the user verbatim).
    Deny { reason: String },
}

/// Stateless gate evaluated once per turn, before the prompt pipeline.
pub struct SafetyGate;

impl SafetyGate {
    /// Check `message` against the controlled-substance lexicon.
    ///
    /// Denies only when a term matches *and* the credential is unverified;
    /// verified clinicians pass through regardless of content.
    pub fn check(message: &str, credential_verified: bool) -> Verdict {
        if credential_verified {
            return Verdict::Allow;
        }

        let lower = message.to_lowercase();
        match CONTROLLED_SUBSTANCES.iter().find(|term| lower.contains(**term)) {
            Some(term) => Verdict::Deny {
                reason: format!("controlled substance term: {term}"),
            },
            None => Verdict::Allow,
        }
    }

    /// Returns `true` when `message` mentions any controlled substance,
    /// independent of verification state.
    pub fn mentions_controlled_substance(message: &str) -> bool {
        let lower = message.to_lowercase();
        CONTROLLED_SUBSTANCES.iter().any(|term| lower.contains(term))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unverified_controlled_substance_is_denied() {
        let verdict = SafetyGate::check("What is the starting dose of morphine for cancer pain?", false);
        assert!(matches!(verdict, Verdict::Deny { .. }));
    }

    #[test]
    fn verified_controlled_substance_is_allowed() {
        let verdict = SafetyGate::check("What is the starting dose of morphine for cancer pain?", true);
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let verdict = SafetyGate::check("FENTANYL patch conversion chart?", false);
        assert!(matches!(verdict, Verdict::Deny { .. }));
    }

    #[test]
    fn unrelated_message_is_allowed() {
        let verdict = SafetyGate::check("Differential for fever and rash in a child?", false);
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn verdict_is_deterministic() {
        let msg = "oxycodone vs tramadol for post-op pain";
        assert_eq!(SafetyGate::check(msg, false), SafetyGate::check(msg, false));
        assert_eq!(SafetyGate::check(msg, true), SafetyGate::check(msg, true));
    }

    #[test]
    fn deny_reason_names_the_matched_term() {
        let Verdict::Deny { reason } = SafetyGate::check("is ketamine safe here?", false) else {
            panic!("expected denial");
        };
        assert!(reason.contains("ketamine"));
    }

    #[test]
    fn mention_check_ignores_verification() {
        assert!(SafetyGate::mentions_controlled_substance("taper plan for diazepam"));
        assert!(!SafetyGate::mentions_controlled_substance("taper plan for metformin"));
    }
}
