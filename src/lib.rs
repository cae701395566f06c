//! Atlas: voice and text personal assistant.
//!
//! Holds a conversation while listening for a wake phrase, capturing spoken
//! commands, speaking replies and watching for due reminders in the
//! background. Destructive actions requested by the language model wait for
//! the user's confirmation.
//!
//! # Architecture
//!
//! - **Audio capture**: microphone streams via `cpal` ([`audio`])
//! - **VAD**: energy-based capture windows and wake segments ([`vad`])
//! - **STT**: whisper.cpp compatible server ([`stt`])
//! - **Wake detection**: transcribed short windows ([`wakeword`])
//! - **Dialogue**: the conversation state machine ([`dialogue`])
//! - **LLM**: Ollama text generation ([`llm`])
//! - **Tools**: named capabilities with safety tags ([`tools`])
//! - **Memory**: SQLite facts, tasks, reminders and conversation log ([`memory`])
//! - **Scheduler**: reminder alerts ([`scheduler`])
//! - **TTS**: queued, stoppable system speech ([`tts`])
//! - **Pipeline**: microphone gate, event hub and session loops ([`pipeline`])

pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod diagnostics;
pub mod dialogue;
pub mod error;
pub mod llm;
pub mod memory;
pub mod pipeline;
pub mod scheduler;
pub mod stt;
pub mod tools;
pub mod tts;
pub mod vad;
pub mod wakeword;

pub use config::AssistantConfig;
pub use dialogue::{DialogueOrchestrator, DialogueServices, DialogueState};
pub use error::{AssistantError, Result};
pub use pipeline::{Session, SessionMode};
