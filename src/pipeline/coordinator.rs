//! Audio pipeline coordinator.
//!
//! Owns the microphone gate and ties together command capture, the wake
//! listener and barge-in during speech output:
//!
//! ```text
//! WakeListener ──signal_wake──▶ EventHub ◀──push_console── console reader
//!       ▲                          │
//!       └──── MicGate ◀── capture_command / speak_interruptible ◀── session
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::events::EventHub;
use super::mic_gate::MicGate;
use super::wake_listener::{WakeListener, WakeListenerOptions};
use crate::audio::AudioSource;
use crate::config::{CaptureConfig, WakeConfig};
use crate::error::Result;
use crate::stt::{Transcriber, filter_transcript};
use crate::tts::SpeechOutput;
use crate::vad::{CaptureStatus, CaptureWindow};
use crate::wakeword::WakeRecognizer;

/// How long one chunk read may block during capture.
const CHUNK_WAIT: Duration = Duration::from_millis(100);

/// How often speech output checks for a barge-in.
const BARGE_IN_POLL: Duration = Duration::from_millis(50);

/// Result of one command capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Usable transcript.
    Heard(String),
    /// No speech, or only noise the recognizer is known to invent.
    NoSpeech,
    /// A console line or shutdown arrived; the recording was discarded.
    Interrupted,
}

/// Microphone owner for one session.
pub struct AudioCoordinator {
    source: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    gate: Arc<MicGate>,
    hub: Arc<EventHub>,
    capture: CaptureConfig,
    listener: Option<WakeListener>,
}

impl AudioCoordinator {
    pub fn new(
        source: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        hub: Arc<EventHub>,
        capture: CaptureConfig,
    ) -> Self {
        Self {
            source,
            transcriber,
            gate: Arc::new(MicGate::new()),
            hub,
            capture,
            listener: None,
        }
    }

    pub fn gate(&self) -> &Arc<MicGate> {
        &self.gate
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Start the wake listener; detections become wake events on the hub.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener thread cannot be spawned.
    pub fn start_wake_listener(
        &mut self,
        recognizer: Box<dyn WakeRecognizer>,
        phrases: Vec<String>,
        wake: &WakeConfig,
    ) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }
        let hub = Arc::clone(&self.hub);
        let listener = WakeListener::spawn(
            Arc::clone(&self.source),
            recognizer,
            Arc::clone(&self.gate),
            WakeListenerOptions {
                phrases,
                retry: Duration::from_secs(wake.retry_secs),
            },
            Box::new(move || hub.signal_wake()),
        )?;
        self.listener = Some(listener);
        Ok(())
    }

    /// Stop the wake listener, if running.
    pub fn stop_wake_listener(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.stop();
        }
    }

    /// Record one command and transcribe it.
    ///
    /// Pauses the wake listener for the duration of the recording and
    /// resumes it afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error when the microphone cannot be opened or the
    /// transcriber fails.
    pub fn capture_command(&self) -> Result<CaptureOutcome> {
        let segment = {
            let _claim = self.gate.claim_capture();
            let mut stream = self.source.open()?;
            let mut window = CaptureWindow::new(&self.capture);
            info!("listening for a command");

            loop {
                if self.hub.is_shutdown() || self.hub.has_console() {
                    info!("capture interrupted");
                    return Ok(CaptureOutcome::Interrupted);
                }
                match stream.next_chunk(CHUNK_WAIT)? {
                    Some(chunk) => {
                        if window.push(&chunk) != CaptureStatus::Listening {
                            break;
                        }
                    }
                    None if window.wall_clock_expired() => {
                        warn!("microphone stalled during capture");
                        break;
                    }
                    None => {}
                }
            }
            debug!(
                recorded = ?window.recorded(),
                speech = window.speech_detected(),
                "capture finished"
            );
            drop(stream);
            window.finish()
        };

        let Some(segment) = segment else {
            return Ok(CaptureOutcome::NoSpeech);
        };
        let text = self.transcriber.transcribe(&segment)?;
        Ok(match filter_transcript(&text) {
            Some(text) => CaptureOutcome::Heard(text),
            None => {
                debug!("discarded transcript {text:?}");
                CaptureOutcome::NoSpeech
            }
        })
    }

    /// Speak `text`, stopping early when the wake phrase is heard.
    ///
    /// Returns `true` when the user barged in; the wake event is consumed.
    /// A console line queued at that moment takes precedence and keeps the
    /// wake pending.
    pub fn speak_interruptible(&self, output: &SpeechOutput, text: &str) -> bool {
        let Some(utterance) = output.enqueue(text) else {
            return false;
        };
        loop {
            if utterance.wait_timeout(BARGE_IN_POLL) {
                return false;
            }
            if self.hub.is_shutdown() {
                output.stop();
                return false;
            }
            if self.hub.wake_pending() {
                output.stop();
                info!("barge-in: speech stopped");
                return self.hub.take_barge_in();
            }
        }
    }
}

impl Drop for AudioCoordinator {
    fn drop(&mut self) {
        self.stop_wake_listener();
    }
}
