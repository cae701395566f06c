//! Microphone access.
//!
//! An [`AudioSource`] hands out one [`AudioStream`] at a time. The stream
//! owns the device: dropping it stops recording and releases the
//! microphone before `drop` returns.

pub mod capture;

use std::time::Duration;

use crate::error::Result;
use crate::pipeline::messages::AudioChunk;

pub use capture::CpalMicrophone;

/// Something that can open a microphone stream.
pub trait AudioSource: Send + Sync {
    /// Open a fresh stream. Recording starts immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Audio`](crate::error::AssistantError::Audio)
    /// if the device is unavailable.
    fn open(&self) -> Result<Box<dyn AudioStream>>;
}

/// An open recording.
pub trait AudioStream: Send {
    /// Next chunk, waiting at most `timeout`. `Ok(None)` means no audio
    /// arrived in time.
    ///
    /// # Errors
    ///
    /// Returns an error when the device stopped delivering audio.
    fn next_chunk(&mut self, timeout: Duration) -> Result<Option<AudioChunk>>;

    /// Discard anything already buffered.
    fn drain(&mut self) {}
}
