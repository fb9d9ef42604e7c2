//! The session transcript: speaker-labeled, append-only.
//!
//! [`SessionTranscript`] is mutated only by the session controller when
//! diarized spans arrive, and read by the insight scheduler and the note
//! generator.  Entries are immutable once appended; the only mutable text
//! in the system is the pre-diarization utterance buffer.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Speaker
// ---------------------------------------------------------------------------

/// Who said a transcript span.  Variant names match the wire contract
/// (`"Doctor"` / `"Patient"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Doctor,
    Patient,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::Doctor => f.write_str("Doctor"),
            Speaker::Patient => f.write_str("Patient"),
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptEntry
// ---------------------------------------------------------------------------

/// One finalized, speaker-attributed span of the consultation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    /// Monotonically increasing id, unique within a session.
    pub id: u64,
    pub speaker: Speaker,
    pub text: String,
    /// Always `true` for appended entries; kept on the type so UI code can
    /// render in-flight material with the same shape.
    pub is_final: bool,
}

// ---------------------------------------------------------------------------
// SessionTranscript
// ---------------------------------------------------------------------------

/// Ordered, session-scoped list of finalized entries.
///
/// # Example
/// ```rust
/// use clinscribe::scribe::transcript::{SessionTranscript, Speaker};
///
/// let mut transcript = SessionTranscript::new();
/// transcript.append(Speaker::Doctor, "Where does it hurt?");
/// transcript.append(Speaker::Patient, "Lower right side.");
/// assert_eq!(transcript.render(), "Doctor: Where does it hurt?\nPatient: Lower right side.");
/// ```
#[derive(Debug, Default)]
pub struct SessionTranscript {
    entries: Vec<TranscriptEntry>,
    next_id: u64,
}

impl SessionTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one finalized entry, returning a clone of it.
    pub fn append(&mut self, speaker: Speaker, text: impl Into<String>) -> TranscriptEntry {
        let entry = TranscriptEntry {
            id: self.next_id,
            speaker,
            text: text.into(),
            is_final: true,
        };
        self.next_id += 1;
        self.entries.push(entry.clone());
        entry
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the last `n` entries as `Speaker: text` lines, for use as
    /// diarization context.
    pub fn context_window(&self, n: usize) -> String {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..]
            .iter()
            .map(|e| format!("{}: {}", e.speaker, e.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render the whole transcript as `Speaker: text` lines.
    pub fn render(&self) -> String {
        self.context_window(self.entries.len())
    }

    /// Length in characters of the rendered transcript; used for the
    /// minimum-content thresholds on insights and notes.
    pub fn rendered_len(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.text.len())
            .sum()
    }

    /// Discard everything.  Called exactly once, on session end.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
