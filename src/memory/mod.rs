//! Persistent store for facts, tasks, reminders and the conversation log.
//!
//! Sub-modules:
//! - `types`: record types and timestamp helpers.
//! - `schema`: SQLite DDL.
//! - `sqlite`: [`SqliteStore`], the single-file backend implementing every
//!   store trait below.
//!
//! The traits are the seams the dialogue orchestrator, the scheduler and the
//! tools depend on; tests substitute in-memory databases.

pub(crate) mod schema;
pub mod sqlite;
pub mod types;

use chrono::NaiveDateTime;

pub use sqlite::{SqliteStore, StoreError};
pub use types::{ConversationRecord, Fact, Reminder, ReminderStatus, Task, TaskStatus};

/// Key/value facts about the user. Keys are lower-cased on every call.
pub trait FactStore: Send + Sync {
    /// Insert or replace a fact.
    fn store_fact(&self, key: &str, value: &str, category: Option<&str>)
    -> Result<(), StoreError>;

    /// Exact lookup by key.
    fn get_fact(&self, key: &str) -> Result<Option<Fact>, StoreError>;

    /// Change the value of an existing fact. Returns `false` when the key is unknown.
    fn update_fact(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Remove a fact. Returns `false` when the key is unknown.
    fn delete_fact(&self, key: &str) -> Result<bool, StoreError>;

    /// All facts, most recently updated first.
    fn list_facts(&self) -> Result<Vec<Fact>, StoreError>;

    /// Facts whose key or value contains `query` (case-insensitive).
    fn search_facts(&self, query: &str) -> Result<Vec<Fact>, StoreError> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .list_facts()?
            .into_iter()
            .filter(|f| f.key.contains(&needle) || f.value.to_lowercase().contains(&needle))
            .collect())
    }
}

/// Persisted reminders polled by the scheduler.
pub trait ReminderStore: Send + Sync {
    /// Create a pending reminder and return its id.
    fn add_reminder(&self, message: &str, due_at: NaiveDateTime) -> Result<i64, StoreError>;

    /// Every pending reminder, earliest due first. Rows that cannot be parsed
    /// are skipped.
    fn list_pending(&self) -> Result<Vec<Reminder>, StoreError>;

    /// Mark a reminder completed. Returns `false` when it was not pending.
    fn complete(&self, id: i64) -> Result<bool, StoreError>;
}

/// To-do list.
pub trait TaskStore: Send + Sync {
    fn add_task(&self, description: &str) -> Result<i64, StoreError>;

    /// Tasks, oldest first, optionally filtered by status.
    fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>, StoreError>;

    /// Mark a task completed. Returns `false` when no pending task has that id.
    fn complete_task(&self, id: i64) -> Result<bool, StoreError>;
}

/// Append-only log of conversation exchanges.
pub trait ConversationLog: Send + Sync {
    fn record_exchange(&self, user_text: &str, assistant_text: &str) -> Result<(), StoreError>;

    /// The most recent `limit` exchanges, oldest first.
    fn recent_exchanges(&self, limit: usize) -> Result<Vec<ConversationRecord>, StoreError>;
}
