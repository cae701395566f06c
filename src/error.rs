//! Error types for the atlas assistant.

use crate::llm::GenerationError;
use crate::memory::StoreError;

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Text generator failure (transport, timeout, status).
    #[error("LLM error: {0}")]
    Llm(#[from] GenerationError),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Wake word detection error.
    #[error("wake error: {0}")]
    Wake(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Persistent store error (facts, tasks, reminders).
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Pipeline coordination error.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
