//! Speech-to-text.
//!
//! [`Transcriber`] turns a captured [`SpeechSegment`] into text. The default
//! backend is a whisper.cpp compatible HTTP server ([`WhisperServerStt`]).
//! [`filter_transcript`] drops the phrases Whisper-style models invent from
//! silence and background noise.

pub mod whisper;

use tracing::debug;

use crate::error::Result;
use crate::pipeline::messages::SpeechSegment;

pub use whisper::WhisperServerStt;

/// Phrases recognizers commonly hallucinate from noise.
const NOISE_PHRASES: &[&str] = &[
    "subtitle",
    "subtitles",
    "thank you",
    "thanks for watching",
    "copyright",
    "all rights reserved",
];

/// Shortest transcript accepted as input.
const MIN_TRANSCRIPT_CHARS: usize = 2;

/// Speech recognizer.
pub trait Transcriber: Send + Sync {
    /// Transcribe a segment. May return an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Stt`](crate::error::AssistantError::Stt) if
    /// the recognizer fails.
    fn transcribe(&self, segment: &SpeechSegment) -> Result<String>;
}

/// Trimmed transcript, or `None` for empty, too short or known-noise text.
pub fn filter_transcript(text: &str) -> Option<String> {
    let text = text.trim();
    if text.chars().count() < MIN_TRANSCRIPT_CHARS {
        return None;
    }
    let lower = text.to_lowercase();
    if NOISE_PHRASES.iter().any(|p| lower.contains(p)) {
        debug!("ignoring noise transcript: {text:?}");
        return None;
    }
    Some(text.to_owned())
}
