//! Message types passed between pipeline stages.

use std::time::{Duration, Instant};

/// A chunk of raw audio samples from the microphone.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples at `sample_rate`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Timestamp when this chunk was captured.
    pub captured_at: Instant,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            captured_at: Instant::now(),
        }
    }

    /// Playback length of the chunk.
    pub fn duration(&self) -> Duration {
        samples_to_duration(self.samples.len(), self.sample_rate)
    }
}

/// A speech segment detected by the energy detector, ready for STT.
#[derive(Debug, Clone)]
pub struct SpeechSegment {
    /// Concatenated audio samples for the entire utterance.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// When the speech segment started.
    pub started_at: Instant,
}

/// What the session loop should react to next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A line typed at the console.
    Console(String),
    /// The wake phrase was heard.
    Wake,
    /// The console reached end of input.
    ConsoleClosed,
}

pub(crate) fn samples_to_duration(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(samples as f64 / f64::from(sample_rate))
}
