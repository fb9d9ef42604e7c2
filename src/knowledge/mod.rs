//! Static clinical knowledge consulted during prompt construction.
//!
//! Two kinds of reference data live here:
//!
//! * [`TRUSTED_SOURCES`] - a digest of trusted public-health data sources
//!   appended to the baseline persona so answers about statistics and
//!   guidelines cite the right institutions.
//! * [`ClinicalProtocol`] - emergency-management protocol excerpts, matched
//!   against the user message by trigger phrase and injected verbatim by the
//!   grounding stage of the prompt pipeline.
//!
//! Protocol text is a condensed excerpt, not the full guideline; it exists
//! to anchor the model's answer, and the excerpt always names its source.

// ---------------------------------------------------------------------------
// Trusted data sources
// ---------------------------------------------------------------------------

/// Digest of trusted Indian and global health data sources.
///
/// Appended once per request by the persona stage.  The model is instructed
/// to prioritise these over general web knowledge for statistics, guidelines
/// and public-health questions.
pub const TRUSTED_SOURCES: &str = "\
---
**Knowledge Base: Trusted Indian & Global Health Data Sources**
When answering questions about statistics, guidelines, or public health, \
prioritise and reference the following sources:

* MoHFW India (https://mohfw.gov.in) - national health advisories and dashboards.
* Data.gov.in MoHFW datasets - state and indicator level health data.
* NHM HMIS Portal - state and district level health statistics.
* WHO Emergency Care Toolkit - triage protocols and red flags.
---";

// ---------------------------------------------------------------------------
// ClinicalProtocol
// ---------------------------------------------------------------------------

/// One protocol document: identity, the phrases that activate it, and the
/// excerpt injected into the system instruction when it matches.
#[derive(Debug, Clone, Copy)]
pub struct ClinicalProtocol {
    /// Stable protocol identifier (institution-style, e.g. `FOGSI-PPH-001`).
    pub id: &'static str,
    /// Human-readable title.
    pub title: &'static str,
    /// Case-insensitive phrases; any one appearing in the user message
    /// activates this protocol.
    pub trigger_phrases: &'static [&'static str],
    /// Condensed stepwise excerpt, markdown formatted.
    pub excerpt: &'static str,
}

// ---------------------------------------------------------------------------
// Static protocol definitions
// ---------------------------------------------------------------------------

static PROTOCOLS: &[ClinicalProtocol] = &[
    ClinicalProtocol {
        id: "FOGSI-PPH-001",
        title: "Management of Postpartum Hemorrhage (PPH)",
        trigger_phrases: &["postpartum hemorrhage", "postpartum haemorrhage", "pph", "bleeding after delivery"],
        excerpt: "\
**FOGSI-PPH-001: Primary PPH (blood loss >= 500 mL within 24 h of delivery)**
1. Minute 0-5: call for help, assess A-B-C, two large-bore IV cannulas, \
send blood for type & cross-match, rapid warm crystalloids up to 2 L, \
high-flow oxygen, continuous vitals, Foley catheter.
2. Minute 0-15: identify cause by the 4 T's. Tone: fundal massage plus \
first-line uterotonics (IV oxytocin infusion; misoprostol 800-1000 mcg PR \
if unavailable). Tissue: confirm placenta complete. Trauma: inspect and \
repair lacerations. Thrombin: review coagulation.
3. Minute 15-30: balloon tamponade if bleeding persists despite uterotonics.
Escalate to the massive transfusion protocol when loss exceeds 1500 mL or \
the patient is unstable.",
    },
    ClinicalProtocol {
        id: "FOGSI-ECL-001",
        title: "Management of Severe Pre-eclampsia and Eclampsia",
        trigger_phrases: &["eclampsia", "pre-eclampsia", "preeclampsia", "magnesium sulphate", "seizure in pregnancy"],
        excerpt: "\
**FOGSI-ECL-001: Severe pre-eclampsia / eclampsia**
1. Seizure control: magnesium sulphate loading dose 4 g IV over 15-20 min \
plus 10 g IM (5 g each buttock), then maintenance 5 g IM 4-hourly.
2. Severe hypertension (>= 160/110): IV labetalol or oral nifedipine; \
target diastolic 90-100 mmHg.
3. Monitor for magnesium toxicity: respiratory rate >= 12/min, patellar \
reflexes present, urine output >= 30 mL/h; antidote calcium gluconate 1 g IV.
4. Definitive treatment is delivery after maternal stabilisation.",
    },
    ClinicalProtocol {
        id: "MTP-OB-001",
        title: "Massive Transfusion Protocol (MTP) - Obstetrics",
        trigger_phrases: &["massive transfusion", "mtp", "transfusion protocol", "hemorrhagic shock", "haemorrhagic shock"],
        excerpt: "\
**MTP-OB-001: Obstetric massive transfusion**
1. Activate when blood loss exceeds 1500 mL with ongoing bleeding or \
hemodynamic instability; assign a dedicated communicator to the blood bank.
2. Pack A: 4 units PRBC + 4 units FFP; transfuse in a 1:1 ratio. Add \
platelets when counts fall below 75,000.
3. Give tranexamic acid 1 g IV over 10 minutes within 3 hours of birth.
4. Monitor ionised calcium, potassium, temperature and coagulation after \
each pack; keep the patient warm.",
    },
    ClinicalProtocol {
        id: "FOGSI-UI-001",
        title: "Management of Uterine Inversion",
        trigger_phrases: &["uterine inversion", "inverted uterus"],
        excerpt: "\
**FOGSI-UI-001: Acute uterine inversion**
1. Call for help, stop uterotonics immediately, do not remove the placenta \
if still attached, start IV fluids for shock.
2. Attempt immediate manual replacement (Johnson's maneuver), pushing the \
fundus upward through the cervix toward the umbilicus.
3. If replacement fails, give uterine relaxants (terbutaline or \
nitroglycerin) and retry; escalate to surgical correction if still failed.
4. After replacement: uterotonics to maintain tone, and monitor closely \
for recurrence.",
    },
];

// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

/// Read-only set of protocol documents consulted by the grounding stage.
///
/// # Example
/// ```rust
/// use clinscribe::knowledge::KnowledgeBase;
///
/// let kb = KnowledgeBase::standard();
/// let hits = kb.matching("How do I manage postpartum hemorrhage at a PHC?");
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].id, "FOGSI-PPH-001");
/// ```
#[derive(Debug)]
pub struct KnowledgeBase {
    protocols: Vec<ClinicalProtocol>,
}

impl KnowledgeBase {
    /// Knowledge base with the built-in protocol set.
    pub fn standard() -> Self {
        Self {
            protocols: PROTOCOLS.to_vec(),
        }
    }

    /// Empty knowledge base (useful for tests that must not match anything).
    pub fn empty() -> Self {
        Self {
            protocols: Vec::new(),
        }
    }

    /// All protocols whose trigger phrases appear in `message`
    /// (case-insensitive substring match), in definition order.
    pub fn matching(&self, message: &str) -> Vec<&ClinicalProtocol> {
        let lower = message.to_lowercase();
        self.protocols
            .iter()
            .filter(|p| p.trigger_phrases.iter().any(|t| lower.contains(t)))
            .collect()
    }

    /// Number of protocols held.
    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    /// Returns `true` when no protocols are held.
    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
