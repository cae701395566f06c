//! Voice activity detection using energy-based analysis.
//!
//! Two detectors share the same RMS measure:
//! - [`CaptureWindow`] bounds one command capture (speech, then trailing
//!   silence or an overall timeout).
//! - [`SpeechSegmenter`] cuts a continuous stream into short segments for
//!   wake-phrase recognition.
//!
//! Durations are measured in audio time (samples seen), so behaviour does not
//! depend on how fast chunks are delivered.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{CaptureConfig, WakeConfig};
use crate::pipeline::messages::{AudioChunk, SpeechSegment, samples_to_duration};

/// Compute RMS energy of audio samples.
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Whether a capture should keep listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Listening,
    /// Speech was followed by enough silence.
    SpeechEnded,
    /// The overall timeout elapsed.
    TimedOut,
}

/// One bounded command capture.
///
/// Recording starts with the first chunk. The speech flag is set once a
/// chunk's RMS exceeds the threshold; the capture ends after `silence` of
/// quiet following speech, or at `timeout`.
#[derive(Debug)]
pub struct CaptureWindow {
    threshold: f32,
    timeout: Duration,
    silence: Duration,
    samples: Vec<f32>,
    sample_rate: u32,
    speech_detected: bool,
    trailing_silence: usize,
    started_at: Instant,
}

impl CaptureWindow {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            threshold: config.speech_threshold,
            timeout: config.timeout(),
            silence: config.silence(),
            samples: Vec::new(),
            sample_rate: 0,
            speech_detected: false,
            trailing_silence: 0,
            started_at: Instant::now(),
        }
    }

    /// Feed one chunk and report whether to continue.
    pub fn push(&mut self, chunk: &AudioChunk) -> CaptureStatus {
        self.sample_rate = chunk.sample_rate;
        self.samples.extend_from_slice(&chunk.samples);

        if compute_rms(&chunk.samples) > self.threshold {
            if !self.speech_detected {
                debug!("speech detected");
            }
            self.speech_detected = true;
            self.trailing_silence = 0;
        } else if self.speech_detected {
            self.trailing_silence += chunk.samples.len();
        }

        self.status()
    }

    /// Current status without new audio.
    pub fn status(&self) -> CaptureStatus {
        if self.speech_detected
            && samples_to_duration(self.trailing_silence, self.sample_rate) >= self.silence
        {
            CaptureStatus::SpeechEnded
        } else if self.recorded() >= self.timeout {
            CaptureStatus::TimedOut
        } else {
            CaptureStatus::Listening
        }
    }

    /// Wall-clock guard for a stalled microphone.
    pub fn wall_clock_expired(&self) -> bool {
        self.started_at.elapsed() >= self.timeout
    }

    pub fn speech_detected(&self) -> bool {
        self.speech_detected
    }

    /// Audio time recorded so far.
    pub fn recorded(&self) -> Duration {
        samples_to_duration(self.samples.len(), self.sample_rate)
    }

    /// The recording, or `None` when no speech was detected.
    pub fn finish(self) -> Option<SpeechSegment> {
        if !self.speech_detected || self.samples.is_empty() {
            return None;
        }
        Some(SpeechSegment {
            samples: self.samples,
            sample_rate: self.sample_rate,
            started_at: self.started_at,
        })
    }
}

/// Energy segmenter for the wake listener.
///
/// Emits a segment once speech is followed by `silence`, or when the segment
/// reaches `max_window`.
#[derive(Debug)]
pub struct SpeechSegmenter {
    threshold: f32,
    silence: Duration,
    max_window: Duration,
    speech_buffer: Vec<f32>,
    sample_rate: u32,
    in_speech: bool,
    trailing_silence: usize,
    speech_start: Option<Instant>,
}

impl SpeechSegmenter {
    pub fn new(config: &WakeConfig) -> Self {
        Self {
            threshold: config.speech_threshold,
            silence: Duration::from_secs_f32(config.silence_secs.max(0.05)),
            max_window: Duration::from_secs_f32(config.max_window_secs.max(0.5)),
            speech_buffer: Vec::new(),
            sample_rate: 0,
            in_speech: false,
            trailing_silence: 0,
            speech_start: None,
        }
    }

    /// Process an audio chunk and return a segment if one is complete.
    pub fn process_chunk(&mut self, chunk: &AudioChunk) -> Option<SpeechSegment> {
        self.sample_rate = chunk.sample_rate;
        let is_speech = compute_rms(&chunk.samples) > self.threshold;

        if is_speech {
            if !self.in_speech {
                self.in_speech = true;
                self.speech_start = Some(chunk.captured_at);
                self.speech_buffer.clear();
            }
            self.trailing_silence = 0;
            self.speech_buffer.extend_from_slice(&chunk.samples);
        } else if self.in_speech {
            self.trailing_silence += chunk.samples.len();
            self.speech_buffer.extend_from_slice(&chunk.samples);
            if samples_to_duration(self.trailing_silence, self.sample_rate) >= self.silence {
                return Some(self.take_segment());
            }
        }

        if self.in_speech
            && samples_to_duration(self.speech_buffer.len(), self.sample_rate) >= self.max_window
        {
            return Some(self.take_segment());
        }
        None
    }

    fn take_segment(&mut self) -> SpeechSegment {
        self.in_speech = false;
        self.trailing_silence = 0;
        SpeechSegment {
            samples: std::mem::take(&mut self.speech_buffer),
            sample_rate: self.sample_rate,
            started_at: self.speech_start.take().unwrap_or_else(Instant::now),
        }
    }

    /// Reset the segmenter state.
    pub fn reset(&mut self) {
        self.speech_buffer.clear();
        self.in_speech = false;
        self.trailing_silence = 0;
        self.speech_start = None;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    const RATE: u32 = 16_000;

    /// 100 ms chunk at a constant amplitude.
    fn chunk(level: f32) -> AudioChunk {
        AudioChunk::new(vec![level; 1_600], RATE)
    }

    #[test]
    fn rms_of_constant_signal_is_its_amplitude() {
        assert!((compute_rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert_eq!(compute_rms(&[]), 0.0);
    }

    #[test]
    fn capture_ends_after_trailing_silence() {
        let mut window = CaptureWindow::new(&CaptureConfig::default());
        assert_eq!(window.push(&chunk(0.0)), CaptureStatus::Listening);
        for _ in 0..5 {
            assert_eq!(window.push(&chunk(0.2)), CaptureStatus::Listening);
        }
        for _ in 0..19 {
            assert_eq!(window.push(&chunk(0.0)), CaptureStatus::Listening);
        }
        assert_eq!(window.push(&chunk(0.0)), CaptureStatus::SpeechEnded);

        let segment = window.finish().expect("speech captured");
        assert_eq!(segment.samples.len(), 26 * 1_600);
        assert_eq!(segment.sample_rate, RATE);
    }

    #[test]
    fn silence_only_times_out_with_no_result() {
        let mut window = CaptureWindow::new(&CaptureConfig::default());
        let mut status = CaptureStatus::Listening;
        let mut pushed = 0;
        while status == CaptureStatus::Listening {
            status = window.push(&chunk(0.001));
            pushed += 1;
        }
        assert_eq!(status, CaptureStatus::TimedOut);
        assert_eq!(pushed, 100);
        assert!(!window.speech_detected());
        assert!(window.finish().is_none());
    }

    #[test]
    fn continuous_speech_is_cut_at_timeout() {
        let config = CaptureConfig {
            timeout_secs: 1.0,
            ..CaptureConfig::default()
        };
        let mut window = CaptureWindow::new(&config);
        for _ in 0..9 {
            assert_eq!(window.push(&chunk(0.3)), CaptureStatus::Listening);
        }
        assert_eq!(window.push(&chunk(0.3)), CaptureStatus::TimedOut);
        assert!(window.finish().is_some());
    }

    #[test]
    fn segmenter_emits_after_short_silence() {
        let config = WakeConfig {
            silence_secs: 0.5,
            ..WakeConfig::default()
        };
        let mut seg = SpeechSegmenter::new(&config);
        assert!(seg.process_chunk(&chunk(0.0)).is_none());
        for _ in 0..4 {
            assert!(seg.process_chunk(&chunk(0.2)).is_none());
        }
        for _ in 0..4 {
            assert!(seg.process_chunk(&chunk(0.0)).is_none());
        }
        let segment = seg.process_chunk(&chunk(0.0)).expect("segment");
        assert_eq!(segment.samples.len(), 9 * 1_600);
    }

    #[test]
    fn segmenter_caps_window_length() {
        let mut seg = SpeechSegmenter::new(&WakeConfig::default());
        for _ in 0..29 {
            assert!(seg.process_chunk(&chunk(0.2)).is_none());
        }
        let segment = seg.process_chunk(&chunk(0.2)).expect("segment");
        assert_eq!(segment.samples.len(), 30 * 1_600);
        assert!(seg.process_chunk(&chunk(0.0)).is_none());
    }
}
