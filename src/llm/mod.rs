//! Text generator seam and the default Ollama backend.
//!
//! The dialogue orchestrator only sees [`TextGenerator`]; replies come back
//! as raw text and are classified by [`GeneratorOutput::parse`].

pub mod ollama;
pub mod output;
pub mod prompt;

pub use ollama::{OllamaGenerator, ProbeStatus};
pub use output::{GeneratorOutput, ToolCallRequest};

/// Synchronous text generation with a bounded timeout.
///
/// Implementations are called from the conversation thread, never from an
/// async task.
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the assembled context.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] on transport failure, timeout, a
    /// non-success status or an unreadable body.
    fn generate(&self, context: &str) -> Result<String, GenerationError>;
}

/// Errors from a generator backend. The `Display` text is shown to the user
/// behind an `[Error]` prefix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Lost connection to the language model: {0}")]
    Connection(String),

    #[error("Request timed out. Model may be busy.")]
    Timeout,

    #[error("Language model returned status {0}")]
    Status(u16),

    #[error("Malformed response from the language model: {0}")]
    Malformed(String),
}
