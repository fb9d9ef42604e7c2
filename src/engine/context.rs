//! The per-request reasoning context and its builder.
//!
//! A [`ReasoningContext`] is created once per user turn, owned exclusively by
//! that turn's pipeline run, and discarded when the turn completes.  The
//! prompt stages append to `system_instruction` and the chain records one
//! audit entry per stage; nothing ever rewrites earlier content, so the
//! instruction and the audit trail only grow.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::knowledge::KnowledgeBase;

use super::result::StructuredKind;
use super::tools::ToolProfile;

// ---------------------------------------------------------------------------
// Conversation history
// ---------------------------------------------------------------------------

/// Who produced a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Wire label used by the LLM API (`"user"` / `"model"`).
    pub fn wire_label(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// DoctorProfile
// ---------------------------------------------------------------------------

/// Medical qualification of the signed-in clinician.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Qualification {
    /// Bachelor of Medicine and Bachelor of Surgery (allopathic).
    #[serde(rename = "MBBS")]
    Mbbs,
    /// Bachelor of Ayurvedic Medicine and Surgery.
    #[serde(rename = "BAMS")]
    Bams,
    /// Bachelor of Homeopathic Medicine and Surgery.
    #[serde(rename = "BHMS")]
    Bhms,
}

impl Qualification {
    pub fn label(self) -> &'static str {
        match self {
            Qualification::Mbbs => "MBBS",
            Qualification::Bams => "BAMS",
            Qualification::Bhms => "BHMS",
        }
    }
}

/// Allopathic prescribing rights attached to the qualification, which vary
/// by state council registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrescribingRights {
    /// Full modern-medicine prescribing rights.
    Full,
    /// Limited rights (state-dependent allowances).
    Limited,
    /// No allopathic prescribing rights.
    None,
}

/// Qualification plus prescribing rights; read-only during a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub qualification: Qualification,
    pub prescribing: PrescribingRights,
}

impl DoctorProfile {
    /// Returns `true` when the profile carries unrestricted allopathic
    /// prescribing rights.
    pub fn has_full_allopathic(&self) -> bool {
        self.prescribing == PrescribingRights::Full
    }
}

impl Default for DoctorProfile {
    fn default() -> Self {
        Self {
            qualification: Qualification::Bams,
            prescribing: PrescribingRights::None,
        }
    }
}

// ---------------------------------------------------------------------------
// ReasoningContext
// ---------------------------------------------------------------------------

/// Mutable state threaded through one pipeline run.
///
/// Invariants maintained by the pipeline (checked in the chain's tests):
///
/// * `user_message` and `history` are never mutated after construction.
/// * `system_instruction` and `audit_trail` are append-only.
/// * Stage execution order is fixed; stages never observe each other's
///   additions out of order.
#[derive(Debug, Clone)]
pub struct ReasoningContext {
    /// The triggering input, immutable after creation.
    pub user_message: String,
    /// Prior conversation turns, oldest first.
    pub history: Vec<ChatTurn>,
    /// Selected specialized mode; `None` means general chat.
    pub active_tool: Option<ToolProfile>,
    /// The clinician's profile, read-only.
    pub doctor: DoctorProfile,
    /// Whether the clinician's license has been verified this session.
    pub credential_verified: bool,
    /// Response language name (e.g. "English").
    pub language: String,
    /// The accumulated system instruction; grows monotonically.
    pub system_instruction: String,
    /// One entry per executed prompt stage, in execution order.
    pub audit_trail: Vec<String>,
    /// Structured output kind decided during the run (by the domain stage
    /// or the diagnostic fallback stage); drives dispatch.
    pub structured_kind: Option<StructuredKind>,
    /// Read-only protocol reference data for the grounding stage.
    pub knowledge: Arc<KnowledgeBase>,
}

// ---------------------------------------------------------------------------
// ContextBuilder
// ---------------------------------------------------------------------------

/// Builds the initial [`ReasoningContext`] for one turn.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use clinscribe::engine::context::ContextBuilder;
/// use clinscribe::knowledge::KnowledgeBase;
///
/// let ctx = ContextBuilder::new("fever and rash in a toddler")
///     .verified(true)
///     .language("English")
///     .knowledge(Arc::new(KnowledgeBase::standard()))
///     .build();
/// assert!(ctx.system_instruction.is_empty());
/// assert!(ctx.audit_trail.is_empty());
/// ```
pub struct ContextBuilder {
    message: String,
    history: Vec<ChatTurn>,
    tool: Option<ToolProfile>,
    doctor: DoctorProfile,
    verified: bool,
    language: String,
    knowledge: Option<Arc<KnowledgeBase>>,
}

impl ContextBuilder {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            tool: None,
            doctor: DoctorProfile::default(),
            verified: false,
            language: "English".into(),
            knowledge: None,
        }
    }

    pub fn history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn tool(mut self, tool: Option<ToolProfile>) -> Self {
        self.tool = tool;
        self
    }

    pub fn doctor(mut self, doctor: DoctorProfile) -> Self {
        self.doctor = doctor;
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn knowledge(mut self, knowledge: Arc<KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Finalize the context.  The system instruction and audit trail start
    /// empty; the layer chain fills them.
    pub fn build(self) -> ReasoningContext {
        ReasoningContext {
            user_message: self.message,
            history: self.history,
            active_tool: self.tool,
            doctor: self.doctor,
            credential_verified: self.verified,
            language: self.language,
            system_instruction: String::new(),
            audit_trail: Vec::new(),
            structured_kind: None,
            knowledge: self
                .knowledge
                .unwrap_or_else(|| Arc::new(KnowledgeBase::standard())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tools::find_tool;

    #[test]
    fn builder_defaults() {
        let ctx = ContextBuilder::new("hello").build();
        assert_eq!(ctx.user_message, "hello");
        assert!(ctx.history.is_empty());
        assert!(ctx.active_tool.is_none());
        assert!(!ctx.credential_verified);
        assert_eq!(ctx.language, "English");
        assert!(ctx.system_instruction.is_empty());
        assert!(ctx.audit_trail.is_empty());
        assert!(ctx.structured_kind.is_none());
    }

    #[test]
    fn builder_sets_all_fields() {
        let tool = *find_tool("ddx").unwrap();
        let ctx = ContextBuilder::new("msg")
            .history(vec![ChatTurn::user("hi"), ChatTurn::model("hello")])
            .tool(Some(tool))
            .doctor(DoctorProfile {
                qualification: Qualification::Mbbs,
                prescribing: PrescribingRights::Full,
            })
            .verified(true)
            .language("Hindi")
            .build();

        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.history[0].role, Role::User);
        assert_eq!(ctx.active_tool.unwrap().id, "ddx");
        assert!(ctx.doctor.has_full_allopathic());
        assert!(ctx.credential_verified);
        assert_eq!(ctx.language, "Hindi");
    }

    #[test]
    fn default_profile_has_no_allopathic_rights() {
        let profile = DoctorProfile::default();
        assert_eq!(profile.qualification, Qualification::Bams);
        assert!(!profile.has_full_allopathic());
    }

    #[test]
    fn role_wire_labels() {
        assert_eq!(Role::User.wire_label(), "user");
        assert_eq!(Role::Model.wire_label(), "model");
    }
}
