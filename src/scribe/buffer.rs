//! Utterance buffer: accumulates transcript fragments into discrete
//! utterances.
//!
//! Fragments arrive continuously from the capture layer.  Flushing them one
//! by one would starve the diarizer of grammatical context (a question and
//! its answer often span fragments), while buffering forever would add
//! unbounded latency.  Two conditions bound the wait, whichever comes
//! first:
//!
//! * **silence** - no new fragment for the configured window (the deadline
//!   resets on every append), or
//! * **size** - the pending text crosses a hard character cap, which
//!   flushes immediately even mid-timer.
//!
//! The buffer itself is pure state; the session controller owns the timer
//! and calls [`UtteranceBuffer::flush`] when the deadline it reads from
//! [`UtteranceBuffer::deadline`] elapses.  On session stop the controller
//! flushes synchronously so no trailing speech is lost.

use tokio::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// UtteranceBuffer
// ---------------------------------------------------------------------------

/// Pending transcript text plus its flush deadline.
///
/// # Example
/// ```rust
/// use tokio::time::{Duration, Instant};
/// use clinscribe::scribe::buffer::UtteranceBuffer;
///
/// let mut buf = UtteranceBuffer::new(250, Duration::from_secs(2));
/// let now = Instant::now();
/// assert_eq!(buf.append("does it hurt", now), None); // waiting for silence
/// assert!(buf.deadline().is_some());
/// assert_eq!(buf.flush().as_deref(), Some("does it hurt"));
/// ```
#[derive(Debug)]
pub struct UtteranceBuffer {
    pending: String,
    cap: usize,
    silence: Duration,
    deadline: Option<Instant>,
}

impl UtteranceBuffer {
    /// Create a buffer with the given character cap and silence window.
    pub fn new(cap: usize, silence: Duration) -> Self {
        Self {
            pending: String::new(),
            cap,
            silence,
            deadline: None,
        }
    }

    /// Append one fragment at time `now`.
    ///
    /// Returns `Some(utterance)` when the append crossed the character cap
    /// (the buffer is drained and the deadline cleared); otherwise the
    /// silence deadline is reset and `None` is returned.  Blank fragments
    /// are ignored entirely and do not touch the deadline.
    pub fn append(&mut self, fragment: &str, now: Instant) -> Option<String> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return None;
        }

        if !self.pending.is_empty() {
            self.pending.push(' ');
        }
        self.pending.push_str(fragment);

        if self.pending.len() > self.cap {
            self.deadline = None;
            return Some(std::mem::take(&mut self.pending));
        }

        self.deadline = Some(now + self.silence);
        None
    }

    /// The instant at which the pending text should be flushed, or `None`
    /// when nothing is buffered.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drain the pending text unconditionally.
    ///
    /// Used both when the silence deadline fires and, synchronously, on
    /// session stop.  Returns `None` when the buffer is empty.
    pub fn flush(&mut self) -> Option<String> {
        self.deadline = None;
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// Current pending text (for UI preview of the unattributed tail).
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn buf() -> UtteranceBuffer {
        UtteranceBuffer::new(250, Duration::from_secs(2))
    }

    // ---- silence deadline --------------------------------------------------

    #[test]
    fn append_arms_the_silence_deadline() {
        let mut b = buf();
        let now = Instant::now();
        assert_eq!(b.append("hello", now), None);
        assert_eq!(b.deadline(), Some(now + Duration::from_secs(2)));
    }

    #[test]
    fn every_append_resets_the_deadline() {
        let mut b = buf();
        let t0 = Instant::now();
        b.append("first", t0);
        let t1 = t0 + Duration::from_millis(1_500);
        b.append("second", t1);
        // The deadline tracks the latest fragment, not the first.
        assert_eq!(b.deadline(), Some(t1 + Duration::from_secs(2)));
        assert_eq!(b.pending(), "first second");
    }

    #[test]
    fn no_flush_occurs_below_the_cap() {
        let mut b = buf();
        let now = Instant::now();
        for i in 0..5 {
            assert_eq!(b.append("word", now + Duration::from_millis(i * 100)), None);
        }
        assert!(!b.is_empty());
    }

    // ---- hard cap ----------------------------------------------------------

    #[test]
    fn crossing_the_cap_flushes_immediately() {
        let mut b = UtteranceBuffer::new(20, Duration::from_secs(2));
        let now = Instant::now();
        assert_eq!(b.append("twelve chars", now), None);
        // This append pushes the pending length past 20.
        let flushed = b.append("and some more", now).expect("cap flush");
        assert_eq!(flushed, "twelve chars and some more");
        assert!(b.is_empty());
        // Cap flush also disarms the timer.
        assert_eq!(b.deadline(), None);
    }

    #[test]
    fn one_oversized_fragment_flushes_alone() {
        let mut b = UtteranceBuffer::new(10, Duration::from_secs(2));
        let flushed = b.append("this fragment is far beyond the cap", Instant::now());
        assert_eq!(flushed.as_deref(), Some("this fragment is far beyond the cap"));
    }

    // ---- explicit flush ----------------------------------------------------

    #[test]
    fn flush_drains_and_disarms() {
        let mut b = buf();
        b.append("tail speech", Instant::now());
        assert_eq!(b.flush().as_deref(), Some("tail speech"));
        assert!(b.is_empty());
        assert_eq!(b.deadline(), None);
        // Second flush is a no-op.
        assert_eq!(b.flush(), None);
    }

    #[test]
    fn flush_on_empty_buffer_returns_none() {
        let mut b = buf();
        assert_eq!(b.flush(), None);
    }

    // ---- fragment hygiene --------------------------------------------------

    #[test]
    fn blank_fragments_are_ignored() {
        let mut b = buf();
        assert_eq!(b.append("   ", Instant::now()), None);
        assert!(b.is_empty());
        assert_eq!(b.deadline(), None);
    }

    #[test]
    fn fragments_are_joined_with_single_spaces() {
        let mut b = buf();
        let now = Instant::now();
        b.append("  does it hurt ", now);
        b.append(" no lower down ", now);
        assert_eq!(b.pending(), "does it hurt no lower down");
    }
}
