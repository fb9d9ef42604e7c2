//! Specialized assistant tool definitions and their response schemas.
//!
//! A [`ToolProfile`] is a pre-configured assistant mode the user can select
//! for a conversation.  Tools that promise machine-readable output carry a
//! [`StructuredKind`]; the dispatcher uses [`response_schema`] to constrain
//! the model and [`StructuredResult::parse`](crate::engine::result::StructuredResult::parse)
//! to read the answer back.

use serde_json::{json, Value};

use super::result::StructuredKind;

// ---------------------------------------------------------------------------
// ToolProfile
// ---------------------------------------------------------------------------

/// One selectable assistant mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolProfile {
    /// Stable identifier used in requests and session records.
    pub id: &'static str,
    /// Display title.
    pub title: &'static str,
    /// One-sentence description injected into the prompt when active.
    pub description: &'static str,
    /// Structured output kind, when this tool demands schema-constrained
    /// JSON; `None` for free-text modes.
    pub structured: Option<StructuredKind>,
}

// ---------------------------------------------------------------------------
// Static tool table
// ---------------------------------------------------------------------------

/// All built-in tools, in presentation order.
pub static TOOLS: &[ToolProfile] = &[
    ToolProfile {
        id: "ddx",
        title: "Differential Diagnosis",
        description: "Input symptoms to receive a structured list of potential diagnoses.",
        structured: Some(StructuredKind::Ddx),
    },
    ToolProfile {
        id: "lab-analyzer",
        title: "Lab Result Analyzer",
        description: "Interpret lab results, identify abnormalities, and suggest next steps.",
        structured: Some(StructuredKind::Lab),
    },
    ToolProfile {
        id: "patient-handout",
        title: "Patient Handout Generator",
        description: "Create easy-to-understand patient handouts for various conditions.",
        structured: Some(StructuredKind::Handout),
    },
    ToolProfile {
        id: "risk-assessment",
        title: "Pregnancy Risk Assessment",
        description: "Assess pregnancy risk factors and produce tiered recommendations.",
        structured: Some(StructuredKind::Risk),
    },
];

/// Look up a tool by its stable id.
pub fn find_tool(id: &str) -> Option<&'static ToolProfile> {
    TOOLS.iter().find(|t| t.id == id)
}

// ---------------------------------------------------------------------------
// Response schemas
// ---------------------------------------------------------------------------

/// The response schema sent with a schema-constrained request for `kind`.
///
/// Field names here are the wire contract; the payload structs in
/// [`result`](crate::engine::result) must deserialize exactly what these
/// schemas make the model produce.
pub fn response_schema(kind: StructuredKind) -> Value {
    match kind {
        StructuredKind::Ddx => json!({
            "type": "OBJECT",
            "properties": {
                "summary": {
                    "type": "STRING",
                    "description": "A natural language summary of the differential diagnoses."
                },
                "diagnoses": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "diagnosis": { "type": "STRING" },
                            "rationale": { "type": "STRING" },
                            "confidence": { "type": "STRING", "enum": ["High", "Medium", "Low"] }
                        },
                        "required": ["diagnosis", "rationale", "confidence"]
                    }
                },
                "questions": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                }
            },
            "required": ["summary", "diagnoses"]
        }),
        StructuredKind::Lab => json!({
            "type": "OBJECT",
            "properties": {
                "summary": {
                    "type": "STRING",
                    "description": "A natural language summary of the lab result analysis."
                },
                "overallInterpretation": {
                    "type": "STRING",
                    "description": "A high-level interpretation of the combined lab results."
                },
                "results": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "parameter": { "type": "STRING" },
                            "value": { "type": "STRING" },
                            "referenceRange": { "type": "STRING" },
                            "interpretation": { "type": "STRING" },
                            "urgency": { "type": "STRING", "enum": ["Normal", "Abnormal", "Critical"] }
                        },
                        "required": ["parameter", "value", "referenceRange", "interpretation", "urgency"]
                    }
                }
            },
            "required": ["summary", "overallInterpretation", "results"]
        }),
        StructuredKind::Handout => json!({
            "type": "OBJECT",
            "properties": {
                "summary": {
                    "type": "STRING",
                    "description": "A short summary of what the handout is about."
                },
                "title": { "type": "STRING" },
                "introduction": { "type": "STRING" },
                "sections": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "heading": { "type": "STRING" },
                            "content": { "type": "STRING" }
                        },
                        "required": ["heading", "content"]
                    }
                },
                "disclaimer": { "type": "STRING" }
            },
            "required": ["summary", "title", "introduction", "sections", "disclaimer"]
        }),
        StructuredKind::Risk => json!({
            "type": "OBJECT",
            "properties": {
                "summary": { "type": "STRING" },
                "riskLevel": { "type": "STRING", "enum": ["Low", "Moderate", "High"] },
                "riskFactors": { "type": "ARRAY", "items": { "type": "STRING" } },
                "recommendations": { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": ["summary", "riskLevel", "riskFactors", "recommendations"]
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
