//! Wake phrase detection.
//!
//! A [`WakeRecognizer`] consumes live audio and reports recognized text,
//! partial or final. [`contains_wake_phrase`] decides whether that text is a
//! wake trigger. The default recognizer cuts the stream into short speech
//! windows with [`SpeechSegmenter`] and runs each through a [`Transcriber`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::WakeConfig;
use crate::pipeline::messages::AudioChunk;
use crate::stt::Transcriber;
use crate::vad::SpeechSegmenter;

/// Text recognized from the live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Partial(String),
    Final(String),
}

impl Recognition {
    pub fn text(&self) -> &str {
        match self {
            Self::Partial(t) | Self::Final(t) => t,
        }
    }
}

/// Streaming recognizer used by the wake listener.
pub trait WakeRecognizer: Send {
    /// Feed a chunk; returns text when some was recognized.
    fn accept(&mut self, chunk: &AudioChunk) -> Option<Recognition>;

    /// Forget buffered audio, e.g. after a detection or a pause.
    fn reset(&mut self);
}

/// Whether `text` contains one of `phrases` (case-insensitive substring).
pub fn contains_wake_phrase(text: &str, phrases: &[String]) -> bool {
    let lower = text.to_lowercase();
    phrases
        .iter()
        .map(|p| p.trim().to_lowercase())
        .any(|p| !p.is_empty() && lower.contains(&p))
}

/// Recognizer that transcribes energy-segmented windows (at most a few
/// seconds each). Every result is final.
pub struct TranscribingWakeRecognizer {
    segmenter: SpeechSegmenter,
    transcriber: Arc<dyn Transcriber>,
}

impl TranscribingWakeRecognizer {
    pub fn new(config: &WakeConfig, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            segmenter: SpeechSegmenter::new(config),
            transcriber,
        }
    }
}

impl WakeRecognizer for TranscribingWakeRecognizer {
    fn accept(&mut self, chunk: &AudioChunk) -> Option<Recognition> {
        let segment = self.segmenter.process_chunk(chunk)?;
        match self.transcriber.transcribe(&segment) {
            Ok(text) if !text.trim().is_empty() => {
                debug!("wake window heard: {text:?}");
                Some(Recognition::Final(text))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("wake transcription failed: {e}");
                None
            }
        }
    }

    fn reset(&mut self) {
        self.segmenter.reset();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::PersonaConfig;
    use crate::error::Result;
    use crate::pipeline::messages::SpeechSegment;
    use std::sync::Mutex;

    #[test]
    fn default_phrases_match_mishearings() {
        let phrases = PersonaConfig::default().wake_phrases;
        assert!(contains_wake_phrase("Hey Atlas", &phrases));
        assert!(contains_wake_phrase("at last you're here", &phrases));
        assert!(contains_wake_phrase("what's the ADDRESS", &phrases));
        assert!(!contains_wake_phrase("good morning", &phrases));
    }

    #[test]
    fn blank_phrases_never_match() {
        assert!(!contains_wake_phrase("anything", &["  ".to_owned()]));
    }

    struct ScriptedTranscriber {
        replies: Mutex<Vec<String>>,
    }

    impl Transcriber for ScriptedTranscriber {
        fn transcribe(&self, _segment: &SpeechSegment) -> Result<String> {
            Ok(self.replies.lock().expect("lock").pop().unwrap_or_default())
        }
    }

    #[test]
    fn transcribes_each_completed_window() {
        let transcriber = Arc::new(ScriptedTranscriber {
            replies: Mutex::new(vec!["hey atlas".to_owned()]),
        });
        let config = WakeConfig {
            silence_secs: 0.5,
            ..WakeConfig::default()
        };
        let mut recognizer = TranscribingWakeRecognizer::new(&config, transcriber);

        let loud = AudioChunk::new(vec![0.2; 1_600], 16_000);
        let quiet = AudioChunk::new(vec![0.0; 1_600], 16_000);
        assert!(recognizer.accept(&loud).is_none());
        for _ in 0..4 {
            assert!(recognizer.accept(&quiet).is_none());
        }
        assert_eq!(
            recognizer.accept(&quiet),
            Some(Recognition::Final("hey atlas".to_owned()))
        );
    }
}
