//! Microphone ownership.
//!
//! The microphone belongs to at most one of the wake listener and command
//! capture. Capture claims it through [`MicGate::claim_capture`], which first
//! moves the gate out of [`MicState::WakeListening`] and then waits until the
//! listener has closed its stream. Dropping the claim hands the microphone
//! back to the listener (when one is attached).

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

/// Who may use the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicState {
    /// The wake listener may hold a stream.
    WakeListening,
    /// Nobody records.
    Paused,
    /// Command capture holds the stream.
    Capturing,
}

#[derive(Debug)]
struct GateState {
    state: MicState,
    /// The wake listener currently holds an open stream.
    wake_stream_open: bool,
    /// A wake listener is attached and should get the mic back after capture.
    wake_enabled: bool,
}

/// Exclusive-access gate for the microphone.
#[derive(Debug)]
pub struct MicGate {
    inner: Mutex<GateState>,
    changed: Condvar,
}

impl Default for MicGate {
    fn default() -> Self {
        Self::new()
    }
}

impl MicGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GateState {
                state: MicState::Paused,
                wake_stream_open: false,
                wake_enabled: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> MicState {
        self.lock().state
    }

    /// Whether the wake listener holds an open stream.
    pub fn wake_stream_open(&self) -> bool {
        self.lock().wake_stream_open
    }

    /// Attach a wake listener and let it start listening.
    pub fn enable_wake(&self) {
        let mut g = self.lock();
        g.wake_enabled = true;
        if g.state == MicState::Paused {
            g.state = MicState::WakeListening;
        }
        self.changed.notify_all();
    }

    /// Detach the wake listener.
    pub fn disable_wake(&self) {
        let mut g = self.lock();
        g.wake_enabled = false;
        if g.state == MicState::WakeListening {
            g.state = MicState::Paused;
        }
        self.changed.notify_all();
    }

    /// Resume wake listening unless a capture is running.
    pub fn resume_wake(&self) {
        let mut g = self.lock();
        if g.wake_enabled && g.state == MicState::Paused {
            g.state = MicState::WakeListening;
            self.changed.notify_all();
        }
    }

    /// Stop wake listening and wait until its stream is closed.
    pub fn pause_wake(&self) {
        let mut g = self.lock();
        if g.state == MicState::WakeListening {
            g.state = MicState::Paused;
            self.changed.notify_all();
        }
        while g.wake_stream_open {
            g = self
                .changed
                .wait(g)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Take the microphone for command capture. Blocks until the wake
    /// listener has released it.
    pub fn claim_capture(&self) -> CaptureClaim<'_> {
        self.pause_wake();
        let mut g = self.lock();
        // pause_wake released the lock; the listener may not reopen because
        // the state is no longer WakeListening.
        g.state = MicState::Capturing;
        debug!("microphone claimed for capture");
        CaptureClaim { gate: self }
    }

    fn release_capture(&self) {
        let mut g = self.lock();
        g.state = if g.wake_enabled {
            MicState::WakeListening
        } else {
            MicState::Paused
        };
        debug!(state = ?g.state, "microphone released by capture");
        self.changed.notify_all();
    }

    /// Listener side: mark the stream open if wake listening is allowed.
    ///
    /// Waits up to `timeout` for [`MicState::WakeListening`]. The returned
    /// token clears the open flag when dropped.
    pub fn enter_wake(&self, timeout: Duration) -> Option<WakeClaim<'_>> {
        let g = self.lock();
        let (mut g, _) = self
            .changed
            .wait_timeout_while(g, timeout, |g| g.state != MicState::WakeListening)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if g.state != MicState::WakeListening {
            return None;
        }
        g.wake_stream_open = true;
        Some(WakeClaim { gate: self })
    }

    /// Listener side: pause after a detection, keeping the stream claim.
    pub fn pause_from_listener(&self) {
        let mut g = self.lock();
        if g.state == MicState::WakeListening {
            g.state = MicState::Paused;
            self.changed.notify_all();
        }
    }

    fn release_wake(&self) {
        self.lock().wake_stream_open = false;
        self.changed.notify_all();
    }

    /// Wake the listener's waits, e.g. on shutdown.
    pub fn notify(&self) {
        self.changed.notify_all();
    }
}

/// Held by command capture; dropping it returns the microphone.
pub struct CaptureClaim<'a> {
    gate: &'a MicGate,
}

impl Drop for CaptureClaim<'_> {
    fn drop(&mut self) {
        self.gate.release_capture();
    }
}

/// Held by the wake listener while its stream is open.
pub struct WakeClaim<'a> {
    gate: &'a MicGate,
}

impl WakeClaim<'_> {
    /// Whether the listener may keep its stream.
    pub fn still_listening(&self) -> bool {
        self.gate.state() == MicState::WakeListening
    }
}

impl Drop for WakeClaim<'_> {
    fn drop(&mut self) {
        self.gate.release_wake();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    #[test]
    fn capture_returns_mic_to_wake_listener() {
        let gate = MicGate::new();
        assert_eq!(gate.state(), MicState::Paused);
        gate.enable_wake();
        assert_eq!(gate.state(), MicState::WakeListening);

        {
            let _claim = gate.claim_capture();
            assert_eq!(gate.state(), MicState::Capturing);
            gate.resume_wake();
            assert_eq!(gate.state(), MicState::Capturing);
        }
        assert_eq!(gate.state(), MicState::WakeListening);
    }

    #[test]
    fn without_listener_capture_returns_to_paused() {
        let gate = MicGate::new();
        drop(gate.claim_capture());
        assert_eq!(gate.state(), MicState::Paused);
    }

    #[test]
    fn listener_cannot_enter_while_capturing() {
        let gate = MicGate::new();
        gate.enable_wake();
        let claim = gate.claim_capture();
        assert!(gate.enter_wake(Duration::from_millis(20)).is_none());
        drop(claim);
        assert!(gate.enter_wake(Duration::from_millis(20)).is_some());
    }

    #[test]
    fn capture_waits_for_listener_to_close_its_stream() {
        let gate = Arc::new(MicGate::new());
        gate.enable_wake();
        let wake_open = Arc::new(AtomicBool::new(false));

        let listener = {
            let gate = Arc::clone(&gate);
            let wake_open = Arc::clone(&wake_open);
            std::thread::spawn(move || {
                let claim = gate.enter_wake(Duration::from_secs(1)).expect("enter");
                wake_open.store(true, Ordering::SeqCst);
                while claim.still_listening() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                // Simulated device shutdown.
                std::thread::sleep(Duration::from_millis(50));
                wake_open.store(false, Ordering::SeqCst);
                drop(claim);
            })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while !gate.wake_stream_open() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let claim = gate.claim_capture();
        assert!(!wake_open.load(Ordering::SeqCst), "both held the mic");
        assert_eq!(gate.state(), MicState::Capturing);
        drop(claim);
        listener.join().expect("join");
    }
}
