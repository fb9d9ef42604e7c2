//! The ambient scribe session controller.
//!
//! One controller instance owns one session: its transcript, its utterance
//! buffer, its timers and its generation counter.  Everything runs on a
//! single event loop ([`SessionController::run`]) that selects over:
//!
//! * the [`SessionInput`] channel from the capture layer / UI,
//! * the utterance buffer's silence-flush deadline,
//! * the insight scheduler's debounce deadline,
//! * an internal channel carrying completions of spawned network tasks.
//!
//! # State machine
//!
//! ```text
//! Idle ──Start──▶ Listening ──(flush ⇄ diarize)──▶ Listening
//!   ▲                 │Stop (synchronous flush)
//!   └─────────────────┘
//! Idle ──End (confirmed)──▶ Ended   [terminal: transcript discarded]
//! ```
//!
//! `assistant_speaking` is orthogonal: capture continues while the
//! assistant talks, but wake-word detection is suppressed so the assistant
//! cannot re-trigger itself.
//!
//! # Concurrency rules
//!
//! * Diarization calls are serialized: at most one in flight, later
//!   utterances queue FIFO, so transcript spans always land in flush order
//!   and the diarizer's context window is never stale.
//! * Insight generation may run concurrently with diarization; it reads a
//!   transcript snapshot taken the moment its deadline fires.
//! * Ending the session bumps a generation counter; any completion carrying
//!   a stale generation is discarded on arrival, so no late diarization or
//!   insight result can mutate a dead session.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};

use crate::config::ScribeConfig;

use super::assistant::{SpokenAnswer, SpokenResponder};
use super::buffer::UtteranceBuffer;
use super::diarizer::{Diarizer, DiarizeError, SpeakerSpan};
use super::insights::{InsightBlock, InsightError, InsightGenerator, InsightScheduler};
use super::transcript::{SessionTranscript, TranscriptEntry};
use super::wake::WakeWordDetector;

// ---------------------------------------------------------------------------
// States / channel types
// ---------------------------------------------------------------------------

/// Core controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not capturing; the only state `Ended` is reachable from.
    Idle,
    /// Capture active; fragments are buffered and flushed for diarization.
    Listening,
    /// Terminal.  Transcript, insights and note have been discarded.
    Ended,
}

/// The phase reported to the UI; `Diarizing` surfaces the in-flight
/// attribution call on top of the core state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Listening,
    Diarizing,
    Ended,
}

/// Commands and data flowing into the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// Begin capturing (Idle → Listening).
    Start,
    /// One finalized transcript fragment from the capture layer.
    Fragment(String),
    /// Stop capturing; the buffer is flushed synchronously so no trailing
    /// speech is lost (Listening → Idle).
    Stop,
    /// Draft a clinical note over the current transcript.
    GenerateNote,
    /// The UI finished playing the assistant's audio.
    PlaybackFinished,
    /// End the session for good.  Honored only from `Idle`, after the UI
    /// has confirmed with the user; everything is discarded.
    End,
}

/// Events flowing out of the session loop to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    StateChanged(CapturePhase),
    /// Newly diarized entries, in transcript order.
    TranscriptAppended(Vec<TranscriptEntry>),
    /// The full replacement insight set, canonically ordered.
    InsightsReplaced(Vec<InsightBlock>),
    AssistantSpeaking(bool),
    /// The assistant's answer to a wake-word question.
    SpokenAnswer(SpokenAnswer),
    /// The drafted clinical note.
    NoteReady(String),
    /// A user-facing, non-fatal error.
    SessionError(String),
    /// The session is over; no further updates will arrive.
    Ended,
}

/// Completions of spawned background tasks, tagged with the generation
/// they belong to.
#[derive(Debug)]
enum TaskDone {
    Diarized {
        generation: u64,
        utterance: String,
        outcome: Result<Vec<SpeakerSpan>, DiarizeError>,
    },
    Insights {
        generation: u64,
        outcome: Result<Vec<InsightBlock>, InsightError>,
    },
    Spoken {
        generation: u64,
        answer: SpokenAnswer,
    },
    Note {
        generation: u64,
        outcome: Result<String, crate::llm::LlmError>,
    },
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Owns and drives one ambient scribe session.
pub struct SessionController {
    config: ScribeConfig,
    transcript: SessionTranscript,
    buffer: UtteranceBuffer,
    wake: WakeWordDetector,
    scheduler: InsightScheduler,

    diarizer: Arc<dyn Diarizer>,
    insights: Arc<dyn InsightGenerator>,
    responder: Arc<dyn SpokenResponder>,

    state: SessionState,
    assistant_speaking: bool,
    diarize_in_flight: bool,
    pending_utterances: VecDeque<String>,
    /// Bumped on `End`; completions from an older generation are dropped.
    generation: u64,
    /// Count of spawned tasks whose completions are still outstanding.
    background_tasks: usize,

    done_tx: mpsc::Sender<TaskDone>,
    done_rx: Option<mpsc::Receiver<TaskDone>>,
    updates: mpsc::Sender<SessionUpdate>,
}

impl SessionController {
    pub fn new(
        config: ScribeConfig,
        diarizer: Arc<dyn Diarizer>,
        insights: Arc<dyn InsightGenerator>,
        responder: Arc<dyn SpokenResponder>,
        updates: mpsc::Sender<SessionUpdate>,
    ) -> Self {
        let buffer = UtteranceBuffer::new(
            config.buffer_cap_chars,
            Duration::from_millis(config.silence_flush_ms),
        );
        let scheduler = InsightScheduler::new(
            Duration::from_millis(config.insight_debounce_ms),
            config.min_transcript_chars,
        );
        let wake = WakeWordDetector::new(&config.wake_word);
        let (done_tx, done_rx) = mpsc::channel(32);

        Self {
            config,
            transcript: SessionTranscript::new(),
            buffer,
            wake,
            scheduler,
            diarizer,
            insights,
            responder,
            state: SessionState::Idle,
            assistant_speaking: false,
            diarize_in_flight: false,
            pending_utterances: VecDeque::new(),
            generation: 0,
            background_tasks: 0,
            done_tx,
            done_rx: Some(done_rx),
            updates,
        }
    }

    /// Current UI-facing phase.
    pub fn phase(&self) -> CapturePhase {
        match self.state {
            SessionState::Ended => CapturePhase::Ended,
            _ if self.diarize_in_flight => CapturePhase::Diarizing,
            SessionState::Listening => CapturePhase::Listening,
            SessionState::Idle => CapturePhase::Idle,
        }
    }

    // -----------------------------------------------------------------------
    // Main event loop
    // -----------------------------------------------------------------------

    /// Run the session until `End` is processed or `inputs` closes and all
    /// outstanding background work has drained.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<SessionInput>) {
        let mut done_rx = self.done_rx.take().expect("run may only be called once");
        let mut inputs_open = true;

        loop {
            if !inputs_open && self.background_tasks == 0 {
                break;
            }

            let flush_at = self.buffer.deadline();
            let insight_at = self.scheduler.deadline();

            tokio::select! {
                maybe_input = inputs.recv(), if inputs_open => {
                    match maybe_input {
                        Some(input) => {
                            if self.handle_input(input).await {
                                break;
                            }
                        }
                        None => {
                            inputs_open = false;
                            self.handle_inputs_closed().await;
                        }
                    }
                }

                _ = async { sleep_until(flush_at.unwrap()).await }, if flush_at.is_some() => {
                    if let Some(text) = self.buffer.flush() {
                        self.process_utterance(text).await;
                    }
                }

                _ = async { sleep_until(insight_at.unwrap()).await }, if insight_at.is_some() => {
                    self.fire_insights();
                }

                Some(done) = done_rx.recv() => {
                    self.handle_done(done).await;
                }
            }
        }

        log::info!("scribe session loop terminated");
    }

    // -----------------------------------------------------------------------
    // Input handling
    // -----------------------------------------------------------------------

    /// Handle one input; returns `true` when the loop should terminate.
    async fn handle_input(&mut self, input: SessionInput) -> bool {
        match input {
            SessionInput::Start => {
                if self.state == SessionState::Idle {
                    self.state = SessionState::Listening;
                    self.emit_phase().await;
                } else {
                    log::debug!("Start ignored in {:?}", self.state);
                }
            }

            SessionInput::Fragment(text) => {
                if self.state != SessionState::Listening {
                    log::debug!("fragment dropped while not listening");
                    return false;
                }
                if let Some(flushed) = self.buffer.append(&text, Instant::now()) {
                    // Hard cap crossed: flush immediately, even mid-timer.
                    self.process_utterance(flushed).await;
                }
            }

            SessionInput::Stop => {
                if self.state == SessionState::Listening {
                    // Synchronous flush so no trailing speech is lost.
                    if let Some(text) = self.buffer.flush() {
                        self.process_utterance(text).await;
                    }
                    self.state = SessionState::Idle;
                    self.emit_phase().await;
                }
            }

            SessionInput::GenerateNote => {
                self.spawn_note().await;
            }

            SessionInput::PlaybackFinished => {
                if self.assistant_speaking {
                    self.assistant_speaking = false;
                    self.emit(SessionUpdate::AssistantSpeaking(false)).await;
                }
            }

            SessionInput::End => {
                if self.state != SessionState::Idle {
                    log::warn!("End ignored in {:?}; stop the session first", self.state);
                    return false;
                }
                self.end_session().await;
                return true;
            }
        }
        false
    }

    /// The capture side went away without an explicit `End`: treat it as a
    /// stop and let outstanding work drain before the loop exits.
    async fn handle_inputs_closed(&mut self) {
        if self.state == SessionState::Listening {
            if let Some(text) = self.buffer.flush() {
                self.process_utterance(text).await;
            }
            self.state = SessionState::Idle;
            self.emit_phase().await;
        }
        self.scheduler.cancel();
    }

    /// Enter the terminal state: bump the generation so late completions
    /// are ignored, then discard everything.
    async fn end_session(&mut self) {
        self.generation += 1;
        self.buffer.flush();
        self.scheduler.cancel();
        self.pending_utterances.clear();
        self.transcript.clear();
        self.state = SessionState::Ended;
        self.emit(SessionUpdate::StateChanged(CapturePhase::Ended)).await;
        self.emit(SessionUpdate::Ended).await;
    }

    // -----------------------------------------------------------------------
    // Utterance routing
    // -----------------------------------------------------------------------

    /// Route one flushed utterance: wake word (unless the assistant is
    /// mid-playback) or diarization.
    async fn process_utterance(&mut self, text: String) {
        if text.trim().is_empty() {
            return;
        }

        if !self.assistant_speaking {
            if let Some(question) = self.wake.detect(&text) {
                self.spawn_spoken_answer(question).await;
                return;
            }
        }

        if self.diarize_in_flight {
            // Serialize: one attribution call at a time, FIFO.
            self.pending_utterances.push_back(text);
        } else {
            self.spawn_diarize(text).await;
        }
    }

    async fn spawn_diarize(&mut self, utterance: String) {
        self.diarize_in_flight = true;
        self.emit_phase().await;

        let context = self
            .transcript
            .context_window(self.config.diarize_context_entries);
        let diarizer = Arc::clone(&self.diarizer);
        let tx = self.done_tx.clone();
        let generation = self.generation;
        self.background_tasks += 1;

        tokio::spawn(async move {
            let outcome = diarizer.diarize(&utterance, &context).await;
            let _ = tx
                .send(TaskDone::Diarized {
                    generation,
                    utterance,
                    outcome,
                })
                .await;
        });
    }

    fn fire_insights(&mut self) {
        if !self.scheduler.fire(self.transcript.rendered_len()) {
            log::debug!("insight tick skipped: transcript below minimum length");
            return;
        }

        // Snapshot at fire time; the generator sees a consistent view even
        // if diarization appends while it runs.
        let snapshot = self.transcript.render();
        let insights = Arc::clone(&self.insights);
        let tx = self.done_tx.clone();
        let generation = self.generation;
        self.background_tasks += 1;

        tokio::spawn(async move {
            let outcome = insights.generate(&snapshot).await;
            let _ = tx.send(TaskDone::Insights { generation, outcome }).await;
        });
    }

    async fn spawn_spoken_answer(&mut self, question: String) {
        self.assistant_speaking = true;
        self.emit(SessionUpdate::AssistantSpeaking(true)).await;

        let responder = Arc::clone(&self.responder);
        let tx = self.done_tx.clone();
        let generation = self.generation;
        self.background_tasks += 1;

        tokio::spawn(async move {
            let answer = responder.answer(&question).await;
            let _ = tx.send(TaskDone::Spoken { generation, answer }).await;
        });
    }

    async fn spawn_note(&mut self) {
        if self.transcript.rendered_len() < self.config.min_transcript_chars {
            self.emit(SessionUpdate::SessionError(
                "Not enough conversation to generate a note.".into(),
            ))
            .await;
            return;
        }

        let snapshot = self.transcript.render();
        let responder = Arc::clone(&self.responder);
        let tx = self.done_tx.clone();
        let generation = self.generation;
        self.background_tasks += 1;

        tokio::spawn(async move {
            let outcome = responder.clinical_note(&snapshot).await;
            let _ = tx.send(TaskDone::Note { generation, outcome }).await;
        });
    }

    // -----------------------------------------------------------------------
    // Completion handling
    // -----------------------------------------------------------------------

    async fn handle_done(&mut self, done: TaskDone) {
        self.background_tasks = self.background_tasks.saturating_sub(1);

        match done {
            TaskDone::Diarized {
                generation,
                utterance,
                outcome,
            } => {
                if generation != self.generation {
                    log::debug!("stale diarization result dropped");
                    return;
                }
                self.diarize_in_flight = false;

                // Attribution failure must never lose transcript content:
                // fall back to a single span under the configured speaker.
                let spans = match outcome {
                    Ok(spans) => spans,
                    Err(e) => {
                        log::warn!(
                            "diarization failed ({e}); inserting utterance as {}",
                            self.config.fallback_speaker
                        );
                        vec![SpeakerSpan {
                            speaker: self.config.fallback_speaker,
                            text: utterance,
                        }]
                    }
                };

                let entries: Vec<TranscriptEntry> = spans
                    .into_iter()
                    .map(|span| self.transcript.append(span.speaker, span.text))
                    .collect();
                self.emit(SessionUpdate::TranscriptAppended(entries)).await;
                self.scheduler.note_mutation(Instant::now());

                match self.pending_utterances.pop_front() {
                    Some(next) => self.spawn_diarize(next).await,
                    None => self.emit_phase().await,
                }
            }

            TaskDone::Insights { generation, outcome } => {
                if generation != self.generation {
                    log::debug!("stale insight result dropped");
                    return;
                }
                match outcome {
                    // Wholesale replacement; the previous set is gone.
                    Ok(blocks) => self.emit(SessionUpdate::InsightsReplaced(blocks)).await,
                    // Non-critical background loop: log and skip this cycle.
                    Err(e) => log::warn!("insight generation failed, skipping cycle: {e}"),
                }
            }

            TaskDone::Spoken { generation, answer } => {
                if generation != self.generation {
                    log::debug!("stale spoken answer dropped");
                    return;
                }
                let has_audio = answer.audio_b64.is_some();
                self.emit(SessionUpdate::SpokenAnswer(answer)).await;
                if !has_audio {
                    // Nothing to play; resume immediately.
                    self.assistant_speaking = false;
                    self.emit(SessionUpdate::AssistantSpeaking(false)).await;
                }
            }

            TaskDone::Note { generation, outcome } => {
                if generation != self.generation {
                    log::debug!("stale note dropped");
                    return;
                }
                match outcome {
                    Ok(note) => self.emit(SessionUpdate::NoteReady(note)).await,
                    Err(e) => {
                        log::warn!("note generation failed: {e}");
                        self.emit(SessionUpdate::SessionError(
                            "Failed to generate clinical note.".into(),
                        ))
                        .await;
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn emit(&self, update: SessionUpdate) {
        let _ = self.updates.send(update).await;
    }

    async fn emit_phase(&self) {
        self.emit(SessionUpdate::StateChanged(self.phase())).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::scribe::insights::InsightCategory;
    use crate::scribe::transcript::Speaker;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Diarizer that records calls, sleeps a per-call latency, and returns
    /// the whole utterance as one Patient span (or fails).
    struct ScriptedDiarizer {
        calls: Mutex<Vec<String>>,
        latencies_ms: Vec<u64>,
        fail: bool,
    }

    impl ScriptedDiarizer {
        fn instant() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                latencies_ms: Vec::new(),
                fail: false,
            }
        }

        fn with_latencies(latencies_ms: Vec<u64>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                latencies_ms,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                latencies_ms: Vec::new(),
                fail: true,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Diarizer for ScriptedDiarizer {
        async fn diarize(
            &self,
            utterance: &str,
            _history: &str,
        ) -> Result<Vec<SpeakerSpan>, DiarizeError> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(utterance.to_string());
                calls.len() - 1
            };
            if let Some(&ms) = self.latencies_ms.get(index) {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            if self.fail {
                return Err(DiarizeError::Empty);
            }
            Ok(vec![SpeakerSpan {
                speaker: Speaker::Patient,
                text: utterance.to_string(),
            }])
        }
    }

    /// Insight generator replying with scripted sets, in call order.
    struct ScriptedInsights {
        sets: Vec<Vec<InsightBlock>>,
        calls: Mutex<usize>,
    }

    impl ScriptedInsights {
        fn new(sets: Vec<Vec<InsightBlock>>) -> Self {
            Self {
                sets,
                calls: Mutex::new(0),
            }
        }

        fn none() -> Self {
            Self::new(Vec::new())
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl InsightGenerator for ScriptedInsights {
        async fn generate(&self, _transcript: &str) -> Result<Vec<InsightBlock>, InsightError> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                let i = *calls;
                *calls += 1;
                i
            };
            match self.sets.get(index) {
                Some(set) => Ok(set.clone()),
                None => Err(InsightError::Parse("no scripted set".into())),
            }
        }
    }

    /// Responder with a fixed answer and note.
    struct ScriptedResponder {
        audio: bool,
        note: Result<&'static str, ()>,
        questions: Mutex<Vec<String>>,
    }

    impl ScriptedResponder {
        fn with_audio() -> Self {
            Self {
                audio: true,
                note: Ok("## Subjective\nFever for two days."),
                questions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpokenResponder for ScriptedResponder {
        async fn answer(&self, question: &str) -> SpokenAnswer {
            self.questions.lock().unwrap().push(question.to_string());
            SpokenAnswer {
                text: "spoken reply".into(),
                audio_b64: self.audio.then(|| "bW9jaw==".to_string()),
            }
        }

        async fn clinical_note(&self, _transcript: &str) -> Result<String, LlmError> {
            match self.note {
                Ok(note) => Ok(note.to_string()),
                Err(()) => Err(LlmError::Timeout),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        inputs: mpsc::Sender<SessionInput>,
        updates: mpsc::Receiver<SessionUpdate>,
    }

    impl Harness {
        fn spawn(
            config: ScribeConfig,
            diarizer: Arc<ScriptedDiarizer>,
            insights: Arc<ScriptedInsights>,
            responder: Arc<ScriptedResponder>,
        ) -> Self {
            let (input_tx, input_rx) = mpsc::channel(32);
            let (update_tx, update_rx) = mpsc::channel(64);
            let controller =
                SessionController::new(config, diarizer, insights, responder, update_tx);
            tokio::spawn(controller.run(input_rx));
            Self {
                inputs: input_tx,
                updates: update_rx,
            }
        }

        async fn send(&self, input: SessionInput) {
            self.inputs.send(input).await.expect("session loop alive");
        }

        /// Receive updates until one matches `pred`, returning it.
        async fn wait_for<F: Fn(&SessionUpdate) -> bool>(&mut self, pred: F) -> SessionUpdate {
            while let Some(update) = self.updates.recv().await {
                if pred(&update) {
                    return update;
                }
            }
            panic!("session loop ended before the expected update arrived");
        }

        /// Drop the input side and collect every remaining update.
        async fn finish(mut self) -> Vec<SessionUpdate> {
            drop(self.inputs);
            let mut rest = Vec::new();
            while let Some(update) = self.updates.recv().await {
                rest.push(update);
            }
            rest
        }
    }

    fn test_config() -> ScribeConfig {
        // Small cap so short test strings can force immediate flushes.
        ScribeConfig {
            buffer_cap_chars: 40,
            min_transcript_chars: 30,
            ..ScribeConfig::default()
        }
    }

    /// A fragment longer than the test cap, flushed on append.
    fn long_fragment(tag: &str) -> String {
        format!("{tag} patient reports severe pain radiating to the back")
    }

    fn is_appended(update: &SessionUpdate) -> bool {
        matches!(update, SessionUpdate::TranscriptAppended(_))
    }

    // -----------------------------------------------------------------------
    // State machine basics
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn start_enters_listening() {
        let mut h = Harness::spawn(
            test_config(),
            Arc::new(ScriptedDiarizer::instant()),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        let update = h
            .wait_for(|u| matches!(u, SessionUpdate::StateChanged(_)))
            .await;
        assert_eq!(update, SessionUpdate::StateChanged(CapturePhase::Listening));
        h.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fragments_are_ignored_while_idle() {
        let diarizer = Arc::new(ScriptedDiarizer::instant());
        let h = Harness::spawn(
            test_config(),
            Arc::clone(&diarizer),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        // No Start sent: the fragment must be dropped.
        h.send(SessionInput::Fragment(long_fragment("ignored"))).await;
        h.finish().await;
        assert_eq!(diarizer.call_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Flush policy
    // -----------------------------------------------------------------------

    /// Fragments below the cap flush only after the silence window.
    #[tokio::test(start_paused = true)]
    async fn silence_elapsing_flushes_the_buffer() {
        let diarizer = Arc::new(ScriptedDiarizer::instant());
        let mut h = Harness::spawn(
            test_config(),
            Arc::clone(&diarizer),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::Fragment("does it hurt".into())).await;
        h.send(SessionInput::Fragment("no lower down".into())).await;

        // The paused clock advances through the 2 s silence window once the
        // loop has nothing else to do; the two fragments flush as one
        // utterance.
        let SessionUpdate::TranscriptAppended(entries) = h.wait_for(is_appended).await else {
            unreachable!();
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "does it hurt no lower down");
        h.finish().await;
        assert_eq!(diarizer.call_count(), 1);
    }

    /// Crossing the cap flushes without waiting for silence.
    #[tokio::test(start_paused = true)]
    async fn cap_crossing_flushes_immediately() {
        let diarizer = Arc::new(ScriptedDiarizer::instant());
        let mut h = Harness::spawn(
            test_config(),
            Arc::clone(&diarizer),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::Fragment(long_fragment("cap"))).await;

        let SessionUpdate::TranscriptAppended(entries) = h.wait_for(is_appended).await else {
            unreachable!();
        };
        assert!(entries[0].text.starts_with("cap"));
        h.finish().await;
    }

    /// Stop flushes whatever is buffered so no trailing speech is lost.
    #[tokio::test(start_paused = true)]
    async fn stop_flushes_the_tail() {
        let diarizer = Arc::new(ScriptedDiarizer::instant());
        let mut h = Harness::spawn(
            test_config(),
            Arc::clone(&diarizer),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::Fragment("short tail".into())).await;
        h.send(SessionInput::Stop).await;

        let SessionUpdate::TranscriptAppended(entries) = h.wait_for(is_appended).await else {
            unreachable!();
        };
        assert_eq!(entries[0].text, "short tail");
        h.finish().await;
    }

    // -----------------------------------------------------------------------
    // Diarization serialization and ordering
    // -----------------------------------------------------------------------

    /// Utterances flushed in order A, B, C must land in the transcript in
    /// that order even when individual diarization calls have wildly
    /// different latencies.
    #[tokio::test(start_paused = true)]
    async fn transcript_order_matches_flush_order_despite_latency() {
        let diarizer = Arc::new(ScriptedDiarizer::with_latencies(vec![300, 50, 200]));
        let mut h = Harness::spawn(
            test_config(),
            Arc::clone(&diarizer),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        for tag in ["alpha", "bravo", "charlie"] {
            h.send(SessionInput::Fragment(long_fragment(tag))).await;
        }

        let mut texts = Vec::new();
        for _ in 0..3 {
            let SessionUpdate::TranscriptAppended(entries) = h.wait_for(is_appended).await else {
                unreachable!();
            };
            texts.extend(entries.into_iter().map(|e| e.text));
        }
        assert!(texts[0].starts_with("alpha"));
        assert!(texts[1].starts_with("bravo"));
        assert!(texts[2].starts_with("charlie"));
        h.finish().await;

        // Serialized: calls were also issued in order.
        let calls = diarizer.calls.lock().unwrap();
        assert!(calls[0].starts_with("alpha"));
        assert!(calls[1].starts_with("bravo"));
        assert!(calls[2].starts_with("charlie"));
    }

    /// Diarization failure falls back to a single default-speaker span;
    /// the utterance text is never lost.
    #[tokio::test(start_paused = true)]
    async fn diarization_failure_inserts_fallback_speaker() {
        let mut h = Harness::spawn(
            test_config(),
            Arc::new(ScriptedDiarizer::failing()),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::Fragment(long_fragment("lost"))).await;

        let SessionUpdate::TranscriptAppended(entries) = h.wait_for(is_appended).await else {
            unreachable!();
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].speaker, Speaker::Patient);
        assert!(entries[0].text.starts_with("lost"));
        h.finish().await;
    }

    // -----------------------------------------------------------------------
    // Wake word
    // -----------------------------------------------------------------------

    /// A wake-word utterance is answered, not diarized.
    #[tokio::test(start_paused = true)]
    async fn wake_word_diverts_to_the_spoken_path() {
        let diarizer = Arc::new(ScriptedDiarizer::instant());
        let responder = Arc::new(ScriptedResponder::with_audio());
        let mut h = Harness::spawn(
            test_config(),
            Arc::clone(&diarizer),
            Arc::new(ScriptedInsights::none()),
            Arc::clone(&responder),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::Fragment(
            "asha what is the maximum dose of magnesium sulphate today".into(),
        ))
        .await;

        let update = h
            .wait_for(|u| matches!(u, SessionUpdate::SpokenAnswer(_)))
            .await;
        let SessionUpdate::SpokenAnswer(answer) = update else {
            unreachable!();
        };
        assert_eq!(answer.text, "spoken reply");
        assert!(answer.audio_b64.is_some());

        h.finish().await;
        assert_eq!(diarizer.call_count(), 0, "wake utterance must skip diarization");
        let questions = responder.questions.lock().unwrap();
        assert!(questions[0].starts_with("what is the maximum dose"));
    }

    /// While the assistant is speaking, the wake word must not re-trigger;
    /// the utterance is treated as consultation speech.
    #[tokio::test(start_paused = true)]
    async fn wake_word_is_suppressed_during_playback() {
        let diarizer = Arc::new(ScriptedDiarizer::instant());
        let mut h = Harness::spawn(
            test_config(),
            Arc::clone(&diarizer),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::Fragment("asha first question please now".into()))
            .await;
        h.wait_for(|u| matches!(u, SessionUpdate::SpokenAnswer(_))).await;

        // Audio is playing (no PlaybackFinished yet): this one diarizes.
        h.send(SessionInput::Fragment(long_fragment("asha but spoken mid-playback")))
            .await;
        h.wait_for(is_appended).await;

        // After playback ends, the wake word works again.
        h.send(SessionInput::PlaybackFinished).await;
        h.send(SessionInput::Fragment("asha second question please now".into()))
            .await;
        h.wait_for(|u| matches!(u, SessionUpdate::SpokenAnswer(_))).await;

        h.finish().await;
        assert_eq!(diarizer.call_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Insights
    // -----------------------------------------------------------------------

    fn block(category: InsightCategory, point: &str) -> InsightBlock {
        InsightBlock {
            category,
            points: vec![point.into()],
        }
    }

    /// Consecutive recomputations replace, never merge.
    #[tokio::test(start_paused = true)]
    async fn insight_recomputation_replaces_the_previous_set() {
        let first = vec![
            block(InsightCategory::QuestionsToAsk, "Any vomiting?"),
            block(InsightCategory::GeneralNote, "Anxious patient."),
        ];
        let second = vec![block(InsightCategory::Ddx, "High: Appendicitis - classic signs")];
        let insights = Arc::new(ScriptedInsights::new(vec![first.clone(), second.clone()]));

        let mut h = Harness::spawn(
            test_config(),
            Arc::new(ScriptedDiarizer::instant()),
            Arc::clone(&insights),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::Fragment(long_fragment("first"))).await;
        h.wait_for(is_appended).await;

        let SessionUpdate::InsightsReplaced(got_first) = h
            .wait_for(|u| matches!(u, SessionUpdate::InsightsReplaced(_)))
            .await
        else {
            unreachable!();
        };
        assert_eq!(got_first, first);

        h.send(SessionInput::Fragment(long_fragment("second"))).await;
        h.wait_for(is_appended).await;

        let SessionUpdate::InsightsReplaced(got_second) = h
            .wait_for(|u| matches!(u, SessionUpdate::InsightsReplaced(_)))
            .await
        else {
            unreachable!();
        };
        // Exactly the second call's categories; nothing merged in.
        assert_eq!(got_second, second);

        h.finish().await;
        assert_eq!(insights.call_count(), 2);
    }

    // -----------------------------------------------------------------------
    // Note generation
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn note_is_generated_over_the_transcript() {
        let mut h = Harness::spawn(
            test_config(),
            Arc::new(ScriptedDiarizer::instant()),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::Fragment(long_fragment("history"))).await;
        h.wait_for(is_appended).await;

        h.send(SessionInput::GenerateNote).await;
        let update = h.wait_for(|u| matches!(u, SessionUpdate::NoteReady(_))).await;
        assert!(matches!(update, SessionUpdate::NoteReady(note) if note.contains("Subjective")));
        h.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn note_below_minimum_transcript_is_refused() {
        let mut h = Harness::spawn(
            test_config(),
            Arc::new(ScriptedDiarizer::instant()),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::GenerateNote).await;
        let update = h
            .wait_for(|u| matches!(u, SessionUpdate::SessionError(_)))
            .await;
        assert!(matches!(
            update,
            SessionUpdate::SessionError(message) if message.contains("Not enough conversation")
        ));
        h.finish().await;
    }

    // -----------------------------------------------------------------------
    // Session end
    // -----------------------------------------------------------------------

    /// End is terminal, discards state, and late diarization results must
    /// not surface afterwards.
    #[tokio::test(start_paused = true)]
    async fn end_discards_and_ignores_late_results() {
        // Slow diarizer: still in flight when the session ends.
        let diarizer = Arc::new(ScriptedDiarizer::with_latencies(vec![5_000]));
        let mut h = Harness::spawn(
            test_config(),
            Arc::clone(&diarizer),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::Fragment(long_fragment("inflight"))).await;
        h.send(SessionInput::Stop).await;
        h.send(SessionInput::End).await;

        h.wait_for(|u| matches!(u, SessionUpdate::Ended)).await;
        let rest = h.finish().await;
        assert!(
            rest.iter().all(|u| !is_appended(u)),
            "no transcript entry may arrive after Ended: {rest:?}"
        );
    }

    /// End is only honored from Idle.
    #[tokio::test(start_paused = true)]
    async fn end_while_listening_is_ignored() {
        let mut h = Harness::spawn(
            test_config(),
            Arc::new(ScriptedDiarizer::instant()),
            Arc::new(ScriptedInsights::none()),
            Arc::new(ScriptedResponder::with_audio()),
        );

        h.send(SessionInput::Start).await;
        h.send(SessionInput::End).await;
        // Still alive: a fragment still flows through to the transcript.
        h.send(SessionInput::Fragment(long_fragment("alive"))).await;
        let SessionUpdate::TranscriptAppended(entries) = h.wait_for(is_appended).await else {
            unreachable!();
        };
        assert!(entries[0].text.starts_with("alive"));
        h.finish().await;
    }
}
