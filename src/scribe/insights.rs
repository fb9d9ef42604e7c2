//! Background clinical insights over the accumulating transcript.
//!
//! Insights are recomputed wholesale from the *entire* finalized transcript
//! (replace, never merge) after a quiet period: every transcript mutation
//! resets the debounce deadline, so a burst of diarized spans produces one
//! recomputation, not one per span.  Below a minimum transcript length no
//! call is made at all; a two-line greeting has no insight content worth a
//! network round trip.
//!
//! The wire contract is `{insights:[{category, points:[string]}]}` with the
//! category vocabulary `DDx | QuestionsToAsk | LabsToConsider |
//! GeneralNote`.  Whatever order the model emits, blocks are re-sorted
//! into the canonical presentation order before they leave this module.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::time::{Duration, Instant};

use crate::engine::context::DoctorProfile;
use crate::llm::{ChatRequest, LlmClient, LlmError};

// ---------------------------------------------------------------------------
// InsightCategory / InsightBlock
// ---------------------------------------------------------------------------

/// Insight categories, in wire-name form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsightCategory {
    #[serde(rename = "DDx")]
    Ddx,
    QuestionsToAsk,
    LabsToConsider,
    GeneralNote,
}

impl InsightCategory {
    /// Canonical presentation priority: actionable items first.
    pub fn priority(self) -> usize {
        match self {
            InsightCategory::QuestionsToAsk => 0,
            InsightCategory::Ddx => 1,
            InsightCategory::LabsToConsider => 2,
            InsightCategory::GeneralNote => 3,
        }
    }

    /// Human-readable label for the UI.
    pub fn label(self) -> &'static str {
        match self {
            InsightCategory::Ddx => "Differential Diagnosis",
            InsightCategory::QuestionsToAsk => "Questions to Ask",
            InsightCategory::LabsToConsider => "Labs to Consider",
            InsightCategory::GeneralNote => "General Note",
        }
    }
}

/// One category of insight points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightBlock {
    pub category: InsightCategory,
    pub points: Vec<String>,
}

/// Wire envelope: `{insights: [...]}`.
#[derive(Debug, Deserialize)]
struct InsightEnvelope {
    insights: Vec<InsightBlock>,
}

/// Sort blocks into the canonical presentation order (stable, so blocks
/// sharing a category keep their relative order).
pub fn sort_canonical(blocks: &mut [InsightBlock]) {
    blocks.sort_by_key(|b| b.category.priority());
}

// ---------------------------------------------------------------------------
// InsightScheduler
// ---------------------------------------------------------------------------

/// Pure debounce bookkeeping for insight recomputation.
///
/// The session controller calls [`note_mutation`](Self::note_mutation) on
/// every transcript change, sleeps until [`deadline`](Self::deadline), and
/// calls [`fire`](Self::fire) when the sleep completes.  A new mutation
/// while a deadline is pending simply moves the deadline (coalescing).
#[derive(Debug)]
pub struct InsightScheduler {
    debounce: Duration,
    min_chars: usize,
    deadline: Option<Instant>,
}

impl InsightScheduler {
    pub fn new(debounce: Duration, min_chars: usize) -> Self {
        Self {
            debounce,
            min_chars,
            deadline: None,
        }
    }

    /// Record a transcript mutation at `now`, (re)arming the deadline.
    pub fn note_mutation(&mut self, now: Instant) {
        self.deadline = Some(now + self.debounce);
    }

    /// The pending recomputation deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the deadline.  Returns `true` when a recomputation should
    /// run for a transcript of `transcript_chars` characters.
    pub fn fire(&mut self, transcript_chars: usize) -> bool {
        self.deadline = None;
        transcript_chars >= self.min_chars
    }

    /// Disarm without firing (session stop / end).
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

// ---------------------------------------------------------------------------
// InsightError / InsightGenerator
// ---------------------------------------------------------------------------

/// Errors that can occur during insight generation.
#[derive(Debug, Error)]
pub enum InsightError {
    /// The underlying LLM call failed.
    #[error("insight request failed: {0}")]
    Transport(#[from] LlmError),

    /// The response did not match the insight envelope.
    #[error("insight response could not be parsed: {0}")]
    Parse(String),
}

/// Async trait for insight-generation backends.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    /// Recompute the full insight set for `transcript`.
    async fn generate(&self, transcript: &str) -> Result<Vec<InsightBlock>, InsightError>;
}

// ---------------------------------------------------------------------------
// LlmInsightGenerator
// ---------------------------------------------------------------------------

/// LLM-backed insight generator using a schema-constrained JSON request.
pub struct LlmInsightGenerator {
    client: Arc<dyn LlmClient>,
    doctor: DoctorProfile,
    language: String,
}

impl LlmInsightGenerator {
    pub fn new(client: Arc<dyn LlmClient>, doctor: DoctorProfile, language: impl Into<String>) -> Self {
        Self {
            client,
            doctor,
            language: language.into(),
        }
    }

    fn system_instruction(&self) -> String {
        format!(
            "You are an expert clinical decision support AI. Your user is a \
             doctor with a {} degree. Analyze the real-time transcript of a \
             doctor-patient consultation and provide concise background \
             suggestions: a running differential, follow-up questions worth \
             asking, and lab investigations to consider. Your output must be \
             a single JSON object that strictly conforms to the provided \
             schema. Do not output any text other than the JSON object. Your \
             response must be in {}.",
            self.doctor.qualification.label(),
            self.language
        )
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "insights": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "category": {
                                "type": "STRING",
                                "enum": ["DDx", "QuestionsToAsk", "LabsToConsider", "GeneralNote"]
                            },
                            "points": { "type": "ARRAY", "items": { "type": "STRING" } }
                        },
                        "required": ["category", "points"]
                    }
                }
            },
            "required": ["insights"]
        })
    }
}

#[async_trait]
impl InsightGenerator for LlmInsightGenerator {
    async fn generate(&self, transcript: &str) -> Result<Vec<InsightBlock>, InsightError> {
        let request = ChatRequest::new(self.system_instruction(), transcript)
            .with_schema(Self::response_schema());

        let raw = self.client.generate(request).await?;

        let envelope: InsightEnvelope =
            serde_json::from_str(raw.trim()).map_err(|e| InsightError::Parse(e.to_string()))?;

        let mut blocks = envelope.insights;
        sort_canonical(&mut blocks);
        Ok(blocks)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StreamEvent;
    use tokio::sync::mpsc;

    // ---- scheduler ---------------------------------------------------------

    #[test]
    fn scheduler_starts_disarmed() {
        let s = InsightScheduler::new(Duration::from_secs(3), 50);
        assert_eq!(s.deadline(), None);
    }

    #[test]
    fn mutation_arms_the_deadline() {
        let mut s = InsightScheduler::new(Duration::from_secs(3), 50);
        let now = Instant::now();
        s.note_mutation(now);
        assert_eq!(s.deadline(), Some(now + Duration::from_secs(3)));
    }

    #[test]
    fn later_mutation_coalesces_the_deadline() {
        let mut s = InsightScheduler::new(Duration::from_secs(3), 50);
        let t0 = Instant::now();
        s.note_mutation(t0);
        let t1 = t0 + Duration::from_secs(2);
        s.note_mutation(t1);
        // One pending deadline, tracking the latest mutation only.
        assert_eq!(s.deadline(), Some(t1 + Duration::from_secs(3)));
    }

    #[test]
    fn fire_clears_the_deadline_and_applies_the_floor() {
        let mut s = InsightScheduler::new(Duration::from_secs(3), 50);
        s.note_mutation(Instant::now());

        assert!(!s.fire(10), "below the floor: no call");
        assert_eq!(s.deadline(), None);

        s.note_mutation(Instant::now());
        assert!(s.fire(200), "above the floor: recompute");
    }

    #[test]
    fn cancel_disarms() {
        let mut s = InsightScheduler::new(Duration::from_secs(3), 50);
        s.note_mutation(Instant::now());
        s.cancel();
        assert_eq!(s.deadline(), None);
    }

    // ---- canonical ordering ------------------------------------------------

    #[test]
    fn sort_canonical_puts_questions_first() {
        let mut blocks = vec![
            InsightBlock { category: InsightCategory::GeneralNote, points: vec!["n".into()] },
            InsightBlock { category: InsightCategory::Ddx, points: vec!["d".into()] },
            InsightBlock { category: InsightCategory::LabsToConsider, points: vec!["l".into()] },
            InsightBlock { category: InsightCategory::QuestionsToAsk, points: vec!["q".into()] },
        ];
        sort_canonical(&mut blocks);
        let order: Vec<InsightCategory> = blocks.iter().map(|b| b.category).collect();
        assert_eq!(
            order,
            vec![
                InsightCategory::QuestionsToAsk,
                InsightCategory::Ddx,
                InsightCategory::LabsToConsider,
                InsightCategory::GeneralNote,
            ]
        );
    }

    #[test]
    fn category_wire_names_round_trip() {
        let json = serde_json::to_string(&InsightCategory::Ddx).unwrap();
        assert_eq!(json, "\"DDx\"");
        let parsed: InsightCategory = serde_json::from_str("\"QuestionsToAsk\"").unwrap();
        assert_eq!(parsed, InsightCategory::QuestionsToAsk);
    }

    // ---- generator ---------------------------------------------------------

    struct CannedLlm(String);

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn generate(&self, _request: ChatRequest) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }

        async fn stream(
            &self,
            _request: ChatRequest,
            _tx: mpsc::Sender<StreamEvent>,
        ) -> Result<(), LlmError> {
            unimplemented!("insights never stream")
        }
    }

    #[tokio::test]
    async fn generator_parses_and_sorts_the_envelope() {
        let reply = r#"{
            "insights": [
                {"category": "GeneralNote", "points": ["Patient is anxious."]},
                {"category": "QuestionsToAsk", "points": ["Any travel history?"]},
                {"category": "DDx", "points": ["High: Dengue - classic presentation"]}
            ]
        }"#;
        let generator = LlmInsightGenerator::new(
            Arc::new(CannedLlm(reply.into())),
            DoctorProfile::default(),
            "English",
        );

        let blocks = generator.generate("Doctor: fever since when?").await.unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].category, InsightCategory::QuestionsToAsk);
        assert_eq!(blocks[1].category, InsightCategory::Ddx);
        assert_eq!(blocks[2].category, InsightCategory::GeneralNote);
    }

    #[tokio::test]
    async fn non_envelope_reply_is_a_parse_error() {
        let generator = LlmInsightGenerator::new(
            Arc::new(CannedLlm("here are some thoughts".into())),
            DoctorProfile::default(),
            "English",
        );
        assert!(matches!(
            generator.generate("transcript").await.unwrap_err(),
            InsightError::Parse(_)
        ));
    }

    #[tokio::test]
    async fn unknown_category_is_a_parse_error() {
        let generator = LlmInsightGenerator::new(
            Arc::new(CannedLlm(
                r#"{"insights":[{"category":"Imaging","points":["x"]}]}"#.into(),
            )),
            DoctorProfile::default(),
            "English",
        );
        assert!(matches!(
            generator.generate("transcript").await.unwrap_err(),
            InsightError::Parse(_)
        ));
    }
}
