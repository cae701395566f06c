//! Background reminder scheduler.
//!
//! Polls pending reminders, announces due ones and keeps re-announcing them
//! until the user confirms.

pub mod runner;

pub use runner::{AlertSink, ReminderScheduler};
