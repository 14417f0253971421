//! Agent persona, turn discipline, and provider configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3-turbo";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_SYNTHESIS_MODEL: &str = "playai-tts";
pub const DEFAULT_VOICE: &str = "Arista-PlayAI";
pub const DEFAULT_LANGUAGE: &str = "en";

const MANUAL_INSTRUCTIONS: &str = "You are a helpful voice AI assistant. \
Keep responses conversational and concise since they will be spoken aloud. \
The user controls when to speak and when to stop, so wait for their input.";

const AUTOMATIC_INSTRUCTIONS: &str = "You are a helpful voice AI assistant. \
Keep responses conversational and concise since they will be spoken aloud.";

const MANUAL_GREETING: &str = "Greet the user and let them know you're ready to help. \
Explain they can tap to speak.";

const AUTOMATIC_GREETING: &str = "Greet the user and offer your assistance.";

/// The agent's persona. Passed by value into each session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Label used when binding the session to the room.
    pub persona: String,
    /// System instructions for the completion engine.
    pub instructions: String,
    /// One-off instructions for the opening utterance.
    pub greeting: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::for_discipline(&Discipline::Manual)
    }
}

impl AgentConfig {
    /// Default persona whose wording matches how turns are taken.
    pub fn for_discipline(discipline: &Discipline) -> Self {
        let (instructions, greeting) = match discipline {
            Discipline::Manual => (MANUAL_INSTRUCTIONS, MANUAL_GREETING),
            Discipline::Automatic(_) => (AUTOMATIC_INSTRUCTIONS, AUTOMATIC_GREETING),
        };
        Self {
            persona: "assistant".to_string(),
            instructions: instructions.to_string(),
            greeting: greeting.to_string(),
        }
    }
}

/// How user turn boundaries are found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Discipline {
    /// The client signals turns explicitly over the data channel.
    #[default]
    Manual,
    /// Voice activity and turn detection infer turns from the audio.
    Automatic(DetectorConfig),
}

/// Tuning for the automatic discipline's detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Apply the noise gate before detection.
    pub noise_suppression: bool,
    /// Samples with a smaller magnitude are silenced by the noise gate.
    pub noise_floor: i16,
    /// Normalized RMS level (0.0..=1.0) at or above which a frame is speech.
    pub vad_threshold: f32,
    /// Speech must last this long before a user turn begins.
    pub min_speech_ms: u64,
    /// Silence of this length ends the user turn.
    pub end_of_turn_silence_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            noise_suppression: true,
            noise_floor: 400,
            vad_threshold: 0.02,
            min_speech_ms: 150,
            end_of_turn_silence_ms: 700,
        }
    }
}

impl DetectorConfig {
    pub fn min_speech(&self) -> Duration {
        Duration::from_millis(self.min_speech_ms)
    }

    pub fn end_of_turn_silence(&self) -> Duration {
        Duration::from_millis(self.end_of_turn_silence_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub model: String,
    pub language: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub model: String,
    pub voice: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_SYNTHESIS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_PROVIDER_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Which provider backends a session's pipeline is built from.
///
/// All three capabilities talk to one OpenAI-compatible endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Upper bound on any single provider call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            transcription: TranscriptionConfig::default(),
            completion: CompletionConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("transcription", &self.transcription)
            .field("completion", &self.completion)
            .field("synthesis", &self.synthesis)
            .finish()
    }
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Provider overrides:
    /// - `GROQ_API_KEY` overrides `api_key`
    /// - `PARLEY_PROVIDER_BASE_URL` overrides `base_url`
    /// - `PARLEY_STT_LANGUAGE` overrides `transcription.language`
    /// - `PARLEY_TTS_VOICE` overrides `synthesis.voice`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("GROQ_API_KEY") {
            self.api_key = key;
        }
        if let Some(url) = lookup("PARLEY_PROVIDER_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Some(language) = lookup("PARLEY_STT_LANGUAGE") {
            self.transcription.language = language;
        }
        if let Some(voice) = lookup("PARLEY_TTS_VOICE") {
            self.synthesis.voice = voice;
        }
    }
}

fn default_bridge_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_bridge_port() -> u16 {
    8100
}

fn default_bridge_sample_rate() -> u32 {
    crate::audio::DEFAULT_SAMPLE_RATE
}

/// Where the media bridge listens, and the format of the audio it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_host")]
    pub host: IpAddr,
    #[serde(default = "default_bridge_port")]
    pub port: u16,
    /// Sample rate of inbound participant audio.
    #[serde(default = "default_bridge_sample_rate")]
    pub sample_rate: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: default_bridge_host(),
            port: default_bridge_port(),
            sample_rate: default_bridge_sample_rate(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "parley_agent=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Everything an [`AgentWorker`](crate::AgentWorker) needs, loadable from a
/// single TOML document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub discipline: Discipline,
    /// Falls back to the discipline's default persona when absent.
    #[serde(default)]
    pub agent: Option<AgentConfig>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AgentSettings {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Loads settings from a TOML file, falling back to defaults when the
    /// file does not exist, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(p) => match std::fs::read_to_string(p) {
                Ok(contents) => Self::from_toml_str(&contents)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::info!(path = p, "agent settings file not found, using defaults");
                    Self::default()
                }
                Err(e) => return Err(SettingsError::FileRead(e)),
            },
            None => Self::default(),
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Environment overrides, on top of [`PipelineConfig::apply_overrides`]:
    /// - `PARLEY_AGENT_HOST` overrides `bridge.host`
    /// - `PARLEY_AGENT_PORT` overrides `bridge.port`
    /// - `PARLEY_LOG_LEVEL` overrides `logging.level`
    /// - `PARLEY_LOG_JSON` overrides `logging.json`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("PARLEY_AGENT_HOST") {
            if let Ok(parsed) = host.parse() {
                self.bridge.host = parsed;
            }
        }
        if let Some(port) = lookup("PARLEY_AGENT_PORT") {
            if let Ok(parsed) = port.parse() {
                self.bridge.port = parsed;
            }
        }
        if let Some(level) = lookup("PARLEY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("PARLEY_LOG_JSON") {
            self.logging.json = parse_flag(&json);
        }
        self.pipeline.apply_overrides(&lookup);
    }

    pub fn agent_config(&self) -> AgentConfig {
        self.agent
            .clone()
            .unwrap_or_else(|| AgentConfig::for_discipline(&self.discipline))
    }
}
