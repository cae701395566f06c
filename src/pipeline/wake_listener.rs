//! Background wake-phrase listener.
//!
//! Runs on its own thread. While the [`MicGate`] allows wake listening it
//! keeps a microphone stream open and feeds it to a [`WakeRecognizer`]. On a
//! match it pauses itself, drains the stream, releases the microphone and
//! then fires the wake callback.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::mic_gate::{MicGate, WakeClaim};
use crate::audio::{AudioSource, AudioStream};
use crate::error::{AssistantError, Result};
use crate::wakeword::{WakeRecognizer, contains_wake_phrase};

/// Called once per detection, after the microphone was released.
pub type WakeCallback = Box<dyn Fn() + Send + Sync>;

/// How long one chunk read may block.
const CHUNK_WAIT: Duration = Duration::from_millis(100);

/// How long the idle listener waits for its turn before rechecking shutdown.
const TURN_WAIT: Duration = Duration::from_millis(200);

/// Granularity of cancellable back-off sleeps.
const BACKOFF_STEP: Duration = Duration::from_millis(50);

/// Settings for [`WakeListener::spawn`].
pub struct WakeListenerOptions {
    pub phrases: Vec<String>,
    /// Back-off after the microphone failed to open or stalled.
    pub retry: Duration,
}

enum ListenEnd {
    Detected,
    Released,
    Failed,
}

/// Handle to the listener thread. Dropping it stops the thread.
pub struct WakeListener {
    cancel: CancellationToken,
    gate: Arc<MicGate>,
    handle: Option<JoinHandle<()>>,
}

impl WakeListener {
    /// Start listening.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Wake`] if the thread cannot be spawned.
    pub fn spawn(
        source: Arc<dyn AudioSource>,
        recognizer: Box<dyn WakeRecognizer>,
        gate: Arc<MicGate>,
        options: WakeListenerOptions,
        on_wake: WakeCallback,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        gate.enable_wake();

        let thread_cancel = cancel.clone();
        let thread_gate = Arc::clone(&gate);
        let handle = std::thread::Builder::new()
            .name("atlas-wake".into())
            .spawn(move || {
                listen_loop(
                    source.as_ref(),
                    recognizer,
                    &thread_gate,
                    &options,
                    &on_wake,
                    &thread_cancel,
                );
            })
            .map_err(|e| {
                gate.disable_wake();
                AssistantError::Wake(format!("cannot spawn wake listener: {e}"))
            })?;

        Ok(Self {
            cancel,
            gate,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to release the microphone.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.gate.disable_wake();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("wake listener panicked");
        }
    }
}

impl Drop for WakeListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen_loop(
    source: &dyn AudioSource,
    mut recognizer: Box<dyn WakeRecognizer>,
    gate: &MicGate,
    options: &WakeListenerOptions,
    on_wake: &WakeCallback,
    cancel: &CancellationToken,
) {
    info!("wake listener started");
    while !cancel.is_cancelled() {
        let Some(claim) = gate.enter_wake(TURN_WAIT) else {
            continue;
        };

        let mut stream = match source.open() {
            Ok(stream) => stream,
            Err(e) => {
                warn!("wake listener cannot open microphone: {e}");
                drop(claim);
                sleep_unless_cancelled(cancel, options.retry);
                continue;
            }
        };
        debug!("wake stream open");
        recognizer.reset();

        match listen(
            stream.as_mut(),
            recognizer.as_mut(),
            &claim,
            &options.phrases,
            cancel,
        ) {
            ListenEnd::Detected => {
                gate.pause_from_listener();
                stream.drain();
                drop(stream);
                drop(claim);
                info!("wake phrase detected");
                on_wake();
            }
            ListenEnd::Released => {
                drop(stream);
                drop(claim);
                debug!("wake stream released");
            }
            ListenEnd::Failed => {
                drop(stream);
                drop(claim);
                sleep_unless_cancelled(cancel, options.retry);
            }
        }
    }
    info!("wake listener stopped");
}

fn listen(
    stream: &mut dyn AudioStream,
    recognizer: &mut dyn WakeRecognizer,
    claim: &WakeClaim<'_>,
    phrases: &[String],
    cancel: &CancellationToken,
) -> ListenEnd {
    loop {
        if cancel.is_cancelled() || !claim.still_listening() {
            return ListenEnd::Released;
        }
        match stream.next_chunk(CHUNK_WAIT) {
            Ok(Some(chunk)) => {
                if let Some(recognition) = recognizer.accept(&chunk)
                    && contains_wake_phrase(recognition.text(), phrases)
                {
                    debug!("wake match in {:?}", recognition.text());
                    return ListenEnd::Detected;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("wake stream failed: {e}");
                return ListenEnd::Failed;
            }
        }
    }
}

fn sleep_unless_cancelled(cancel: &CancellationToken, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && !cancel.is_cancelled() {
        let step = remaining.min(BACKOFF_STEP);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::pipeline::messages::AudioChunk;
    use crate::pipeline::mic_gate::MicState;
    use crate::wakeword::Recognition;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    struct ToneStream;

    impl AudioStream for ToneStream {
        fn next_chunk(&mut self, _timeout: Duration) -> Result<Option<AudioChunk>> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(Some(AudioChunk::new(vec![0.1; 160], 16_000)))
        }
    }

    struct ToneSource {
        opened: AtomicUsize,
    }

    impl AudioSource for ToneSource {
        fn open(&self) -> Result<Box<dyn AudioStream>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ToneStream))
        }
    }

    struct BrokenSource;

    impl AudioSource for BrokenSource {
        fn open(&self) -> Result<Box<dyn AudioStream>> {
            Err(AssistantError::Audio("no device".into()))
        }
    }

    /// Hears `text` after `after` chunks.
    struct CountingRecognizer {
        seen: usize,
        after: usize,
        text: &'static str,
    }

    impl WakeRecognizer for CountingRecognizer {
        fn accept(&mut self, _chunk: &AudioChunk) -> Option<Recognition> {
            self.seen += 1;
            (self.seen >= self.after).then(|| Recognition::Partial(self.text.to_owned()))
        }

        fn reset(&mut self) {
            self.seen = 0;
        }
    }

    fn options() -> WakeListenerOptions {
        WakeListenerOptions {
            phrases: vec!["atlas".to_owned()],
            retry: Duration::from_millis(20),
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn detection_pauses_and_releases_before_callback() {
        let gate = Arc::new(MicGate::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let source = Arc::new(ToneSource {
            opened: AtomicUsize::new(0),
        });

        let callback_gate = Arc::clone(&gate);
        let callback_fired = Arc::clone(&fired);
        let mut listener = WakeListener::spawn(
            source,
            Box::new(CountingRecognizer {
                seen: 0,
                after: 3,
                text: "hey Atlas",
            }),
            Arc::clone(&gate),
            options(),
            Box::new(move || {
                assert!(!callback_gate.wake_stream_open());
                assert_eq!(callback_gate.state(), MicState::Paused);
                callback_fired.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .expect("spawn");

        assert!(wait_until(|| fired.load(Ordering::SeqCst) == 1));
        // Paused until someone resumes it: no second detection.
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        gate.resume_wake();
        assert!(wait_until(|| fired.load(Ordering::SeqCst) == 2));
        listener.stop();
        assert!(!gate.wake_stream_open());
    }

    #[test]
    fn non_matching_text_is_ignored() {
        let gate = Arc::new(MicGate::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let callback_fired = Arc::clone(&fired);
        let listener = WakeListener::spawn(
            Arc::new(ToneSource {
                opened: AtomicUsize::new(0),
            }),
            Box::new(CountingRecognizer {
                seen: 0,
                after: 1,
                text: "good morning",
            }),
            Arc::clone(&gate),
            options(),
            Box::new(move || {
                callback_fired.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .expect("spawn");

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        drop(listener);
        assert_eq!(gate.state(), MicState::Paused);
    }

    #[test]
    fn capture_claim_closes_the_wake_stream() {
        let gate = Arc::new(MicGate::new());
        let source = Arc::new(ToneSource {
            opened: AtomicUsize::new(0),
        });
        let _listener = WakeListener::spawn(
            Arc::clone(&source) as Arc<dyn AudioSource>,
            Box::new(CountingRecognizer {
                seen: 0,
                after: usize::MAX,
                text: "",
            }),
            Arc::clone(&gate),
            options(),
            Box::new(|| {}),
        )
        .expect("spawn");

        assert!(wait_until(|| gate.wake_stream_open()));
        let claim = gate.claim_capture();
        assert!(!gate.wake_stream_open());
        drop(claim);
        assert!(wait_until(|| source.opened.load(Ordering::SeqCst) >= 2));
    }

    #[test]
    fn open_failures_are_retried_until_stopped() {
        let gate = Arc::new(MicGate::new());
        let mut listener = WakeListener::spawn(
            Arc::new(BrokenSource),
            Box::new(CountingRecognizer {
                seen: 0,
                after: 1,
                text: "atlas",
            }),
            Arc::clone(&gate),
            options(),
            Box::new(|| {}),
        )
        .expect("spawn");
        std::thread::sleep(Duration::from_millis(80));
        let started = Instant::now();
        listener.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
