//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//!
//! The calibrated timing values in [`ScribeConfig`] (silence flush, buffer
//! cap, insight debounce) are tunable settings, not invariants; the defaults
//! are starting points, not known optima.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::context::DoctorProfile;
use crate::scribe::transcript::Speaker;

use super::AppPaths;

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the LLM API used by the reasoning engine, the diarizer and
/// the insight generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the API endpoint.
    pub base_url: String,
    /// API key; requests without one will be rejected by the service.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature (0.0 - 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            model: "gemini-2.5-flash".into(),
            temperature: 0.4,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the text-to-speech service used by the spoken-answer path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Base URL of the TTS endpoint.
    pub base_url: String,
    /// BCP-47 language code sent with every synthesis request.
    pub language_code: String,
    /// Maximum seconds to wait for synthesized audio.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://texttospeech.googleapis.com".into(),
            language_code: "en-US".into(),
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// ScribeConfig
// ---------------------------------------------------------------------------

/// Settings for the ambient scribe session loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScribeConfig {
    /// Milliseconds of transcript silence after which the utterance buffer
    /// is flushed for diarization.
    pub silence_flush_ms: u64,
    /// Hard cap on buffered characters; crossing it flushes immediately,
    /// even mid-timer.
    pub buffer_cap_chars: usize,
    /// Milliseconds of transcript quiescence before insights are recomputed.
    pub insight_debounce_ms: u64,
    /// Minimum rendered transcript length (chars) before any insight or
    /// note request is made.
    pub min_transcript_chars: usize,
    /// Number of recent labeled entries handed to the diarizer as context.
    pub diarize_context_entries: usize,
    /// Keyword that diverts an utterance to the spoken-answer path.
    pub wake_word: String,
    /// Speaker label assigned to an utterance when diarization fails.
    ///
    /// Explicit policy choice: defaulting to `Patient` matches the common
    /// failure case (long uninterrupted patient narration), and every
    /// fallback insertion is logged so mislabeling stays visible.
    pub fallback_speaker: Speaker,
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            silence_flush_ms: 2_000,
            buffer_cap_chars: 250,
            insight_debounce_ms: 3_000,
            min_transcript_chars: 50,
            diarize_context_entries: 6,
            wake_word: "asha".into(),
            fallback_speaker: Speaker::Patient,
        }
    }
}

// ---------------------------------------------------------------------------
// ProfileConfig
// ---------------------------------------------------------------------------

/// The signed-in clinician's profile and presentation language.
///
/// `language` precedes `doctor` so the TOML serializer writes the scalar
/// before the nested table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Response language name injected into prompts (e.g. "English",
    /// "Hindi", "Marathi").
    pub language: String,
    /// Qualification and prescribing rights; shapes tone and scope of every
    /// response.
    pub doctor: DoctorProfile,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            language: "English".into(),
            doctor: DoctorProfile::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use clinscribe::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM API settings.
    pub llm: LlmConfig,
    /// Text-to-speech settings.
    pub tts: TtsConfig,
    /// Ambient scribe session settings.
    pub scribe: ScribeConfig,
    /// Clinician profile and language.
    pub profile: ProfileConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns `true` when no `settings.toml` file exists yet.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
