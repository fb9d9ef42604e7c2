//! Wake-word detection for the spoken-answer path.
//!
//! A flushed utterance that contains the wake word is a question for the
//! assistant, not consultation speech: it skips diarization entirely and
//! the text after the keyword becomes the spoken question.  Detection is a
//! plain case-insensitive substring scan; the capture layer lowercases
//! nothing, so the scan works on a lowered copy.

// ---------------------------------------------------------------------------
// WakeWordDetector
// ---------------------------------------------------------------------------

/// Detects the configured wake word inside an utterance.
///
/// # Example
/// ```rust
/// use clinscribe::scribe::wake::WakeWordDetector;
///
/// let detector = WakeWordDetector::new("asha");
/// let question = detector.detect("Asha, what is the max dose of paracetamol?");
/// assert_eq!(question.as_deref(), Some("what is the max dose of paracetamol?"));
/// ```
#[derive(Debug, Clone)]
pub struct WakeWordDetector {
    keyword: String,
}

impl WakeWordDetector {
    /// Fallback question used when the wake word arrives with nothing
    /// after it ("Asha?" followed by silence).
    pub const DEFAULT_QUESTION: &'static str = "please summarize the conversation so far";

    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
        }
    }

    /// Scan `utterance` for the wake word.
    ///
    /// On a match, returns the question: the text after the keyword with
    /// leading punctuation stripped, lowercased (the question is spoken
    /// back, so case carries no information), or
    /// [`Self::DEFAULT_QUESTION`] when nothing follows.  Returns `None`
    /// when the wake word is absent.
    pub fn detect(&self, utterance: &str) -> Option<String> {
        let lower = utterance.to_lowercase();
        let at = lower.find(&self.keyword)?;

        let after = lower[at + self.keyword.len()..]
            .trim_start_matches([',', '.', '!', '?', ':', ' '])
            .trim();

        if after.is_empty() {
            Some(Self::DEFAULT_QUESTION.to_string())
        } else {
            Some(after.to_string())
        }
    }

    /// The keyword being scanned for (lowercase).
    pub fn keyword(&self) -> &str {
        &self.keyword
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
