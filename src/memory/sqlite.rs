//! SQLite-backed store.
//!
//! One database file holds facts, tasks, reminders and the conversation log.
//! Thread-safe via an internal `Mutex<Connection>`; every call holds the lock
//! for its whole statement sequence.

use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use super::schema::{apply_schema, read_schema_version};
use super::types::{
    ConversationRecord, Fact, Reminder, ReminderStatus, Task, TaskStatus, format_timestamp,
    normalize_key, now_local, parse_timestamp,
};
use super::{ConversationLog, FactStore, ReminderStore, TaskStore};

/// SQLite implementation of every store trait.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and `--manual` dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read the schema version stamp.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl FactStore for SqliteStore {
    fn store_fact(
        &self,
        key: &str,
        value: &str,
        category: Option<&str>,
    ) -> Result<(), StoreError> {
        let key = normalize_key(key);
        if key.is_empty() {
            return Err(StoreError::InvalidRecord("empty fact key".to_owned()));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO facts (key, value, category, updated_at) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             category = excluded.category, updated_at = excluded.updated_at",
            params![key, value.trim(), category, format_timestamp(now_local())],
        )?;
        Ok(())
    }

    fn get_fact(&self, key: &str) -> Result<Option<Fact>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT key, value, category, updated_at FROM facts WHERE key = ?1",
                params![normalize_key(key)],
                raw_fact,
            )
            .optional()?;
        Ok(row.and_then(fact_from_raw))
    }

    fn update_fact(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE facts SET value = ?1, updated_at = ?2 WHERE key = ?3",
            params![value.trim(), format_timestamp(now_local()), normalize_key(key)],
        )?;
        Ok(rows > 0)
    }

    fn delete_fact(&self, key: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM facts WHERE key = ?1",
            params![normalize_key(key)],
        )?;
        Ok(rows > 0)
    }

    fn list_facts(&self) -> Result<Vec<Fact>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, value, category, updated_at FROM facts \
             ORDER BY updated_at DESC, key ASC",
        )?;
        let rows = stmt.query_map([], raw_fact)?;

        let mut facts = Vec::new();
        for r in rows {
            if let Some(fact) = fact_from_raw(r?) {
                facts.push(fact);
            }
        }
        Ok(facts)
    }
}

impl ReminderStore for SqliteStore {
    fn add_reminder(&self, message: &str, due_at: NaiveDateTime) -> Result<i64, StoreError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(StoreError::InvalidRecord("empty reminder message".to_owned()));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO reminders (message, due_at, status) VALUES (?1, ?2, 'pending')",
            params![message, format_timestamp(due_at)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_pending(&self) -> Result<Vec<Reminder>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, message, due_at FROM reminders WHERE status = 'pending' ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut reminders = Vec::new();
        for r in rows {
            let (id, message, due_raw) = match r {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("skipping unreadable reminder row: {e}");
                    continue;
                }
            };
            match parse_timestamp(&due_raw) {
                Some(due_at) => reminders.push(Reminder {
                    id,
                    message,
                    due_at,
                    status: ReminderStatus::Pending,
                }),
                None => warn!(id, due_at = %due_raw, "skipping reminder with unparseable due time"),
            }
        }
        reminders.sort_by_key(|r| (r.due_at, r.id));
        Ok(reminders)
    }

    fn complete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE reminders SET status = 'completed' WHERE id = ?1 AND status = 'pending'",
            params![id],
        )?;
        Ok(rows > 0)
    }
}

impl TaskStore for SqliteStore {
    fn add_task(&self, description: &str) -> Result<i64, StoreError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(StoreError::InvalidRecord("empty task description".to_owned()));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (description, status, created_at) VALUES (?1, 'pending', ?2)",
            params![description, format_timestamp(now_local())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, description, status, created_at FROM tasks \
             WHERE ?1 IS NULL OR status = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![status.map(TaskStatus::as_str)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut tasks = Vec::new();
        for r in rows {
            let (id, description, status_raw, created_raw) = r?;
            let (Some(status), Some(created_at)) =
                (TaskStatus::parse(&status_raw), parse_timestamp(&created_raw))
            else {
                warn!(id, "skipping malformed task row");
                continue;
            };
            tasks.push(Task {
                id,
                description,
                status,
                created_at,
            });
        }
        Ok(tasks)
    }

    fn complete_task(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE tasks SET status = 'completed' WHERE id = ?1 AND status = 'pending'",
            params![id],
        )?;
        Ok(rows > 0)
    }
}

impl ConversationLog for SqliteStore {
    fn record_exchange(&self, user_text: &str, assistant_text: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO conversations (user_text, assistant_text, at) VALUES (?1, ?2, ?3)",
            params![user_text, assistant_text, format_timestamp(now_local())],
        )?;
        Ok(())
    }

    fn recent_exchanges(&self, limit: usize) -> Result<Vec<ConversationRecord>, StoreError> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT id, user_text, assistant_text, at FROM conversations \
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for r in rows {
            let (id, user_text, assistant_text, at_raw) = r?;
            if let Some(at) = parse_timestamp(&at_raw) {
                records.push(ConversationRecord {
                    id,
                    user_text,
                    assistant_text,
                    at,
                });
            }
        }
        records.reverse();
        Ok(records)
    }
}

/// Errors from the SQLite store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

type RawFact = (String, String, Option<String>, String);

fn raw_fact(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFact> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn fact_from_raw((key, value, category, updated_raw): RawFact) -> Option<Fact> {
    match parse_timestamp(&updated_raw) {
        Some(updated_at) => Some(Fact {
            key,
            value,
            category,
            updated_at,
        }),
        None => {
            warn!(key = %key, "skipping fact with unparseable timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::super::types::CURRENT_SCHEMA_VERSION;
    use super::*;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("open in-memory store")
    }

    #[test]
    fn open_creates_file_and_schema() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = dir.path().join("nested").join("memory.db");
        let store = SqliteStore::open(&path).expect("open");
        assert!(path.exists());
        assert_eq!(
            store.schema_version().expect("version"),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }

    #[test]
    fn facts_are_keyed_case_insensitively() {
        let store = test_store();
        store.store_fact("Name", "Mohan", None).expect("store");

        let fact = store.get_fact("NAME").expect("get").expect("present");
        assert_eq!(fact.key, "name");
        assert_eq!(fact.value, "Mohan");
    }

    #[test]
    fn store_fact_overwrites_existing_value() {
        let store = test_store();
        store.store_fact("city", "Leeds", None).expect("store");
        store
            .store_fact("city", "York", Some("location"))
            .expect("store again");

        let facts = store.list_facts().expect("list");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value, "York");
        assert_eq!(facts[0].category.as_deref(), Some("location"));
    }

    #[test]
    fn update_and_delete_report_missing_keys() {
        let store = test_store();
        assert!(!store.update_fact("ghost", "x").expect("update"));
        assert!(!store.delete_fact("ghost").expect("delete"));

        store.store_fact("pet", "cat", None).expect("store");
        assert!(store.update_fact("pet", "dog").expect("update"));
        assert_eq!(store.get_fact("pet").expect("get").expect("some").value, "dog");
        assert!(store.delete_fact("PET").expect("delete"));
        assert!(store.get_fact("pet").expect("get").is_none());
    }

    #[test]
    fn search_matches_key_or_value_substring() {
        let store = test_store();
        store.store_fact("favourite colour", "Teal", None).expect("store");
        store.store_fact("name", "Mohan", None).expect("store");

        let hits = store.search_facts("colour").expect("search");
        assert_eq!(hits.len(), 1);
        let hits = store.search_facts("moh").expect("search");
        assert_eq!(hits[0].key, "name");
    }

    #[test]
    fn reminders_complete_once() {
        let store = test_store();
        let due = now_local() - chrono::Duration::seconds(5);
        let id = store.add_reminder("drink water", due).expect("add");

        let pending = store.list_pending().expect("pending");
        assert_eq!(pending.len(), 1);
        assert!(pending[0].is_due(now_local()));

        assert!(store.complete(id).expect("complete"));
        assert!(!store.complete(id).expect("complete again"));
        assert!(store.list_pending().expect("pending").is_empty());
    }

    #[test]
    fn unparseable_reminder_row_is_skipped() {
        let store = test_store();
        {
            let conn = store.lock().expect("lock");
            conn.execute(
                "INSERT INTO reminders (message, due_at, status) VALUES ('broken', 'whenever', 'pending')",
                [],
            )
            .expect("insert broken row");
        }
        store
            .add_reminder("valid", now_local())
            .expect("add valid reminder");

        let pending = store.list_pending().expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message, "valid");
    }

    #[test]
    fn tasks_filter_by_status() {
        let store = test_store();
        let first = store.add_task("buy milk").expect("add");
        store.add_task("call mum").expect("add");
        assert!(store.complete_task(first).expect("complete"));
        assert!(!store.complete_task(first).expect("complete again"));

        assert_eq!(store.list_tasks(None).expect("all").len(), 2);
        let pending = store.list_tasks(Some(TaskStatus::Pending)).expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].description, "call mum");
        let done = store
            .list_tasks(Some(TaskStatus::Completed))
            .expect("completed");
        assert_eq!(done[0].id, first);
    }

    #[test]
    fn conversation_log_returns_recent_in_order() {
        let store = test_store();
        for i in 0..5 {
            store
                .record_exchange(&format!("q{i}"), &format!("a{i}"))
                .expect("record");
        }
        let recent = store.recent_exchanges(2).expect("recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_text, "q3");
        assert_eq!(recent[1].assistant_text, "a4");
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let store = test_store();
        assert!(matches!(
            store.store_fact("  ", "x", None),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(store.add_task("").is_err());
        assert!(store.add_reminder(" ", now_local()).is_err());
    }
}
