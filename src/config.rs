//! Configuration types for the assistant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Persona, wake phrases and dialogue limits.
    pub assistant: PersonaConfig,
    /// Text generator backend.
    pub llm: LlmConfig,
    /// Microphone settings.
    pub audio: AudioConfig,
    /// Command capture window.
    pub capture: CaptureConfig,
    /// Wake detection segmentation.
    pub wake: WakeConfig,
    /// Speech-to-text server.
    pub stt: SttConfig,
    /// Text-to-speech output.
    pub tts: TtsConfig,
    /// Reminder scheduler timing.
    pub scheduler: SchedulerConfig,
    /// Database and file sandbox locations.
    pub storage: StorageConfig,
}

/// Persona and dialogue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Name the assistant answers to (used in prompts and the console).
    pub name: String,
    /// Phrases that count as a wake trigger (substring, case-insensitive).
    ///
    /// Includes common mis-hearings of the name.
    pub wake_phrases: Vec<String>,
    /// Phrase that terminates the session when found in any input.
    pub shutdown_phrase: String,
    /// Number of exchanges kept in the rolling conversation history.
    pub history_exchanges: usize,
    /// Maximum stored facts injected into the system prompt.
    pub max_facts_in_prompt: usize,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Atlas".to_owned(),
            wake_phrases: ["atlas", "at less", "at lass", "at last", "address"]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            shutdown_phrase: "shutdown".to_owned(),
            history_exchanges: 10,
            max_facts_in_prompt: 20,
        }
    }
}

/// Text generator configuration (Ollama-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the generator server.
    pub api_url: String,
    /// Model name passed to the server.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Timeout for the startup availability probe in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            // Ollama default endpoint.
            api_url: "http://localhost:11434".to_owned(),
            model: "llama3.2:3b".to_owned(),
            timeout_secs: 120,
            probe_timeout_secs: 5,
        }
    }
}

impl LlmConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Audio input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate delivered to the pipeline in Hz.
    pub input_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            input_device: None,
        }
    }
}

/// Command capture window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Overall capture timeout in seconds.
    pub timeout_secs: f32,
    /// Silence after detected speech that closes the capture, in seconds.
    pub silence_secs: f32,
    /// RMS energy above which a chunk counts as speech.
    ///
    /// For f32 samples in \[-1, 1\]; 0.03 corresponds to roughly 1000 on a
    /// 16-bit scale.
    pub speech_threshold: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10.0,
            silence_secs: 2.0,
            speech_threshold: 0.03,
        }
    }
}

impl CaptureConfig {
    /// Overall timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f32(self.timeout_secs.max(0.1))
    }

    /// Trailing silence as a [`Duration`].
    pub fn silence(&self) -> Duration {
        Duration::from_secs_f32(self.silence_secs.max(0.05))
    }
}

/// Wake detection segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Longest window transcribed in one go, in seconds.
    pub max_window_secs: f32,
    /// Silence that closes a wake window, in seconds.
    pub silence_secs: f32,
    /// RMS energy above which a chunk counts as speech.
    pub speech_threshold: f32,
    /// Back-off after a microphone failure before retrying, in seconds.
    pub retry_secs: u64,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            max_window_secs: 3.0,
            silence_secs: 0.6,
            speech_threshold: 0.03,
            retry_secs: 2,
        }
    }
}

/// Speech-to-text server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Base URL of a whisper.cpp compatible server.
    pub api_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Language hint passed to the server.
    pub language: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_owned(),
            timeout_secs: 30,
            language: "en".to_owned(),
        }
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Explicit synthesizer command. When `None`, the first of `say`,
    /// `espeak-ng` and `espeak` found on `PATH` is used.
    pub command: Option<String>,
    /// Speaking rate in words per minute.
    pub rate_wpm: u32,
    /// Speak only the first sentences of long replies.
    pub short_only: bool,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            command: None,
            rate_wpm: 180,
            short_only: false,
        }
    }
}

/// Reminder scheduler timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Poll period in seconds.
    pub poll_secs: u64,
    /// Minimum spacing between announcements of one alert, in seconds.
    pub reannounce_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_secs: 5,
            reannounce_secs: 45,
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Directory file tools are confined to.
    pub files_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: crate::app_dirs::database_path(),
            files_dir: crate::app_dirs::files_dir(),
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AssistantError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config_dir>/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_dir().join("config.toml")
    }
}
