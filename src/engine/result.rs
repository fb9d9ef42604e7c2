//! Typed model results and the wire-level payload shapes behind them.
//!
//! Every chat turn produces a stream of [`ChatEvent`]s.  Free-text turns emit
//! `TextChunk`s in arrival order with one trailing `Citations` event when
//! search grounding produced any; structured turns emit exactly one
//! `Structured` event carrying a fully parsed payload (never partial JSON).
//!
//! The payload structs mirror the JSON contracts field-for-field, including
//! camelCase names where the wire uses them (`overallInterpretation`,
//! `referenceRange`, `riskLevel`).  Deserialization through `serde` is the
//! only parsing path, so a malformed response can never surface as a
//! half-filled report.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Citation
// ---------------------------------------------------------------------------

/// One web citation attached to a grounded free-text answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Structured payloads
// ---------------------------------------------------------------------------

/// Confidence tier vocabulary used by differential diagnosis payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// One candidate diagnosis with its supporting rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdxItem {
    pub diagnosis: String,
    pub rationale: String,
    pub confidence: Confidence,
}

/// Differential diagnosis report:
/// `{summary, diagnoses:[...], questions:[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdxReport {
    pub summary: String,
    pub diagnoses: Vec<DdxItem>,
    /// Key questions that would narrow the differential; optional on the
    /// wire, empty when the model omits it.
    #[serde(default)]
    pub questions: Vec<String>,
}

/// Urgency vocabulary used by lab analysis payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    Normal,
    Abnormal,
    Critical,
}

/// One analysed lab parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabParameter {
    pub parameter: String,
    pub value: String,
    pub reference_range: String,
    pub interpretation: String,
    pub urgency: Urgency,
}

/// Lab result analysis:
/// `{summary, overallInterpretation, results:[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabReport {
    pub summary: String,
    pub overall_interpretation: String,
    pub results: Vec<LabParameter>,
}

/// One section of a patient handout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoutSection {
    pub heading: String,
    pub content: String,
}

/// Patient handout:
/// `{summary, title, introduction, sections:[...], disclaimer}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoutReport {
    pub summary: String,
    pub title: String,
    pub introduction: String,
    pub sections: Vec<HandoutSection>,
    pub disclaimer: String,
}

/// Risk tier vocabulary used by risk assessment payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

/// Pregnancy risk assessment:
/// `{summary, riskLevel, riskFactors:[...], recommendations:[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub summary: String,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// StructuredKind / StructuredResult
// ---------------------------------------------------------------------------

/// Identifies which structured payload a request (and its response) carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredKind {
    Ddx,
    Lab,
    Handout,
    Risk,
}

impl StructuredKind {
    /// Stable label used in logs and audit entries.
    pub fn label(self) -> &'static str {
        match self {
            StructuredKind::Ddx => "ddx",
            StructuredKind::Lab => "lab",
            StructuredKind::Handout => "handout",
            StructuredKind::Risk => "risk-assessment",
        }
    }
}

impl std::fmt::Display for StructuredKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A fully parsed structured response.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResult {
    Ddx(DdxReport),
    Lab(LabReport),
    Handout(HandoutReport),
    Risk(RiskReport),
}

impl StructuredResult {
    /// Parse raw model output into the payload type for `kind`.
    ///
    /// The whole response is parsed in one pass; any mismatch (truncated
    /// JSON, missing field, out-of-vocabulary enum value) is an error and
    /// the caller must surface a generic failure instead of a partial
    /// report.
    pub fn parse(kind: StructuredKind, raw: &str) -> Result<Self, serde_json::Error> {
        let raw = raw.trim();
        match kind {
            StructuredKind::Ddx => serde_json::from_str(raw).map(StructuredResult::Ddx),
            StructuredKind::Lab => serde_json::from_str(raw).map(StructuredResult::Lab),
            StructuredKind::Handout => serde_json::from_str(raw).map(StructuredResult::Handout),
            StructuredKind::Risk => serde_json::from_str(raw).map(StructuredResult::Risk),
        }
    }

    /// The kind tag of this payload.
    pub fn kind(&self) -> StructuredKind {
        match self {
            StructuredResult::Ddx(_) => StructuredKind::Ddx,
            StructuredResult::Lab(_) => StructuredKind::Lab,
            StructuredResult::Handout(_) => StructuredKind::Handout,
            StructuredResult::Risk(_) => StructuredKind::Risk,
        }
    }

    /// The natural-language summary every payload carries.
    pub fn summary(&self) -> &str {
        match self {
            StructuredResult::Ddx(r) => &r.summary,
            StructuredResult::Lab(r) => &r.summary,
            StructuredResult::Handout(r) => &r.summary,
            StructuredResult::Risk(r) => &r.summary,
        }
    }
}

// ---------------------------------------------------------------------------
// ChatEvent
// ---------------------------------------------------------------------------

/// One fragment of a chat turn's result, emitted in order over a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A streamed increment of free text.
    TextChunk(String),
    /// Web citations collected from grounding metadata; at most one per
    /// turn, after the final text chunk.
    Citations(Vec<Citation>),
    /// The single parsed payload of a structured turn.
    Structured(StructuredResult),
    /// The safety gate refused the request before any model call.
    VerificationRequired {
        /// The message held back, so the UI can resubmit it after
        /// verification succeeds.
        pending_message: String,
    },
    /// A transport or parse failure, already reduced to a user-facing
    /// message.
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
