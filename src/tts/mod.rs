//! Text-to-speech output.
//!
//! [`SpeechOutput`] owns one worker thread that drives a
//! [`SpeechSynthesizer`]. Utterances are queued and played in order;
//! [`SpeechOutput::stop`] discards everything queued before it and cancels
//! the utterance in progress.

pub mod command;
pub mod text;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TtsConfig;
use crate::error::{AssistantError, Result};

pub use command::CommandSynthesizer;

/// A speech engine. Implementations block until the utterance finished or
/// `cancel` fired.
pub trait SpeechSynthesizer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AssistantError::Tts`] if the engine fails.
    fn speak(&self, text: &str, cancel: &CancellationToken) -> Result<()>;
}

/// Whether [`SpeechOutput::speak`] waits for the utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakMode {
    Wait,
    FireAndForget,
}

struct Job {
    text: String,
    generation: u64,
    done: Sender<()>,
}

struct Shared {
    /// Bumped by every stop; jobs from older generations are dropped.
    generation: AtomicU64,
    current: Mutex<CancellationToken>,
    speaking: AtomicBool,
}

/// Completion signal for one queued utterance.
pub struct Utterance {
    done: Receiver<()>,
}

impl Utterance {
    /// Wait up to `timeout`. Returns `true` once the utterance finished or
    /// was discarded.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(
            self.done.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }

    /// Block until the utterance finished or was discarded.
    pub fn wait(&self) {
        let _ = self.done.recv();
    }
}

/// Serialised speech output.
pub struct SpeechOutput {
    tx: Option<Sender<Job>>,
    shared: Arc<Shared>,
    short_only: bool,
    worker: Option<JoinHandle<()>>,
}

impl SpeechOutput {
    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(synth: Arc<dyn SpeechSynthesizer>, config: &TtsConfig) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            current: Mutex::new(CancellationToken::new()),
            speaking: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("atlas-tts".into())
            .spawn(move || worker_loop(synth, rx, worker_shared))
            .map_err(|e| AssistantError::Tts(format!("cannot spawn speech worker: {e}")))?;

        Ok(Self {
            tx: Some(tx),
            shared,
            short_only: config.short_only,
            worker: Some(worker),
        })
    }

    /// Queue `text` for speaking after shaping it for speech.
    pub fn speak(&self, text: &str, mode: SpeakMode) {
        if let Some(utterance) = self.enqueue(text)
            && mode == SpeakMode::Wait
        {
            utterance.wait();
        }
    }

    /// Queue `text` and return its completion signal, or `None` when there
    /// is nothing to say.
    pub fn enqueue(&self, text: &str) -> Option<Utterance> {
        let spoken = text::prepare(text, self.short_only)?;
        let tx = self.tx.as_ref()?;
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let job = Job {
            text: spoken,
            generation: self.shared.generation.load(Ordering::SeqCst),
            done: done_tx,
        };
        if tx.send(job).is_err() {
            warn!("speech worker is gone");
            return None;
        }
        Some(Utterance { done: done_rx })
    }

    /// Drop every queued utterance and cancel the current one.
    pub fn stop(&self) {
        let current = self
            .shared
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        current.cancel();
        debug!("speech stopped");
    }

    /// Whether an utterance is playing right now.
    pub fn is_speaking(&self) -> bool {
        self.shared.speaking.load(Ordering::SeqCst)
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        self.stop();
        self.tx.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("speech worker panicked");
        }
    }
}

fn worker_loop(synth: Arc<dyn SpeechSynthesizer>, rx: Receiver<Job>, shared: Arc<Shared>) {
    info!("speech worker started");
    for job in rx {
        let token = {
            let mut current = shared
                .current
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if job.generation != shared.generation.load(Ordering::SeqCst) {
                debug!("skipping utterance queued before stop");
                continue;
            }
            *current = CancellationToken::new();
            current.clone()
        };

        shared.speaking.store(true, Ordering::SeqCst);
        if let Err(e) = synth.speak(&job.text, &token) {
            warn!("speech failed: {e}");
        }
        shared.speaking.store(false, Ordering::SeqCst);
        let _ = job.done.send(());
    }
    info!("speech worker stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::time::Instant;

    /// Records utterances; each takes `duration` unless cancelled.
    struct FakeSynth {
        duration: Duration,
        spoken: Mutex<Vec<String>>,
    }

    impl SpeechSynthesizer for FakeSynth {
        fn speak(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
            self.spoken.lock().expect("lock").push(text.to_owned());
            let deadline = Instant::now() + self.duration;
            while Instant::now() < deadline && !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }
    }

    fn output(duration: Duration) -> (SpeechOutput, Arc<FakeSynth>) {
        let synth = Arc::new(FakeSynth {
            duration,
            spoken: Mutex::new(Vec::new()),
        });
        let out = SpeechOutput::start(synth.clone(), &TtsConfig::default()).expect("start");
        (out, synth)
    }

    #[test]
    fn wait_mode_blocks_until_spoken() {
        let (out, synth) = output(Duration::from_millis(50));
        let started = Instant::now();
        out.speak("Hello.", SpeakMode::Wait);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(*synth.spoken.lock().expect("lock"), vec!["Hello.".to_owned()]);
    }

    #[test]
    fn utterances_play_in_order() {
        let (out, synth) = output(Duration::from_millis(5));
        out.speak("one", SpeakMode::FireAndForget);
        out.speak("two", SpeakMode::FireAndForget);
        out.speak("three", SpeakMode::Wait);
        assert_eq!(
            *synth.spoken.lock().expect("lock"),
            vec!["one".to_owned(), "two".to_owned(), "three".to_owned()]
        );
    }

    #[test]
    fn stop_cancels_current_and_discards_queue() {
        let (out, synth) = output(Duration::from_secs(10));
        let first = out.enqueue("long speech").expect("queued");
        let second = out.enqueue("never spoken").expect("queued");

        let deadline = Instant::now() + Duration::from_secs(5);
        while !out.is_speaking() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let started = Instant::now();
        out.stop();

        assert!(first.wait_timeout(Duration::from_secs(2)));
        assert!(second.wait_timeout(Duration::from_secs(2)));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(
            *synth.spoken.lock().expect("lock"),
            vec!["long speech".to_owned()]
        );
    }

    #[test]
    fn speaking_resumes_after_stop() {
        let (out, synth) = output(Duration::from_millis(5));
        out.stop();
        out.speak("after", SpeakMode::Wait);
        assert_eq!(*synth.spoken.lock().expect("lock"), vec!["after".to_owned()]);
    }

    #[test]
    fn tool_payloads_are_not_queued() {
        let (out, synth) = output(Duration::ZERO);
        assert!(out.enqueue(r#"{"tool": "get_time"}"#).is_none());
        drop(out);
        assert!(synth.spoken.lock().expect("lock").is_empty());
    }
}
