//! Session pipeline: microphone ownership, wake detection, command capture
//! and the interactive loops.

pub mod coordinator;
pub mod events;
pub mod messages;
pub mod mic_gate;
pub mod session;
pub mod wake_listener;

pub use coordinator::{AudioCoordinator, CaptureOutcome};
pub use events::EventHub;
pub use mic_gate::{MicGate, MicState};
pub use session::{Session, SessionMode, spawn_console_reader};
pub use wake_listener::{WakeCallback, WakeListener, WakeListenerOptions};
