//! Event hub joining the console reader, the wake listener and the session
//! loop.
//!
//! Console lines queue in order. The wake signal is edge-triggered: any
//! number of detections before the session looks collapse into one pending
//! wake. When both are pending the console line is delivered first.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::messages::SessionEvent;

#[derive(Debug, Default)]
struct HubState {
    console: VecDeque<String>,
    wake_pending: bool,
    console_closed: bool,
    closed_reported: bool,
    shutdown: bool,
}

/// Shared event queue for the session loop.
#[derive(Debug, Default)]
pub struct EventHub {
    state: Mutex<HubState>,
    signal: Condvar,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a console line.
    pub fn push_console(&self, line: impl Into<String>) {
        self.lock().console.push_back(line.into());
        self.signal.notify_all();
    }

    /// Record a wake detection.
    pub fn signal_wake(&self) {
        self.lock().wake_pending = true;
        self.signal.notify_all();
    }

    /// The console reached end of input.
    pub fn close_console(&self) {
        self.lock().console_closed = true;
        self.signal.notify_all();
    }

    /// Stop the session: every waiter returns `None` from now on.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.signal.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    /// Whether a console line is waiting.
    pub fn has_console(&self) -> bool {
        !self.lock().console.is_empty()
    }

    /// Next queued console line, if any.
    pub fn take_console(&self) -> Option<String> {
        self.lock().console.pop_front()
    }

    /// Whether a wake is pending, without consuming it.
    pub fn wake_pending(&self) -> bool {
        self.lock().wake_pending
    }

    /// Consume a pending wake. Returns whether there was one.
    pub fn take_wake(&self) -> bool {
        std::mem::take(&mut self.lock().wake_pending)
    }

    /// Consume a wake that arrived while the assistant was speaking.
    ///
    /// A queued console line takes precedence: the wake then stays pending
    /// and this returns `false`.
    pub fn take_barge_in(&self) -> bool {
        let mut state = self.lock();
        if !state.console.is_empty() {
            return false;
        }
        std::mem::take(&mut state.wake_pending)
    }

    fn pop_event(state: &mut HubState) -> Option<SessionEvent> {
        if let Some(line) = state.console.pop_front() {
            return Some(SessionEvent::Console(line));
        }
        if std::mem::take(&mut state.wake_pending) {
            return Some(SessionEvent::Wake);
        }
        if state.console_closed && !state.closed_reported {
            state.closed_reported = true;
            return Some(SessionEvent::ConsoleClosed);
        }
        None
    }

    /// Block until an event is available or the hub shuts down.
    pub fn wait_event(&self) -> Option<SessionEvent> {
        let mut state = self.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(event) = Self::pop_event(&mut state) {
                return Some(event);
            }
            state = self
                .signal
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Like [`wait_event`](Self::wait_event) but gives up after `timeout`.
    pub fn wait_event_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(event) = Self::pop_event(&mut state) {
                return Some(event);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = self
                .signal
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}
