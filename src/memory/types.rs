//! Record types shared by the store traits and the SQLite backend.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Text format used for every timestamp column.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A remembered fact about the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Lower-cased key.
    pub key: String,
    pub value: String,
    pub category: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Completed,
}

/// A persisted reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub message: String,
    /// Local wall-clock due time.
    pub due_at: NaiveDateTime,
    pub status: ReminderStatus,
}

impl Reminder {
    /// Whether the reminder is pending and its due time is at or before `now`.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.status == ReminderStatus::Pending && self.due_at <= now
    }
}

/// One persisted conversation exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: i64,
    pub user_text: String,
    pub assistant_text: String,
    pub at: NaiveDateTime,
}

/// Current local time truncated to whole seconds.
pub(crate) fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    parse_timestamp(&format_timestamp(now)).unwrap_or(now)
}

pub(crate) fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts a space instead of `T` and fractional seconds.
pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Normalise a fact key: trimmed and lower-cased.
pub(crate) fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn timestamp_round_trips() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 14)
            .and_then(|d| d.and_hms_opt(9, 26, 53))
            .expect("valid date");
        assert_eq!(parse_timestamp(&format_timestamp(at)), Some(at));
    }

    #[test]
    fn parse_timestamp_accepts_common_variants() {
        assert!(parse_timestamp("2026-03-14 09:26:53").is_some());
        assert!(parse_timestamp("2026-03-14T09:26:53.123").is_some());
        assert!(parse_timestamp("2026-03-14T09:26").is_some());
        assert!(parse_timestamp("tomorrow-ish").is_none());
    }

    #[test]
    fn reminder_is_due_only_when_pending_and_past() {
        let now = now_local();
        let mut reminder = Reminder {
            id: 1,
            message: "stretch".to_owned(),
            due_at: now - chrono::Duration::seconds(1),
            status: ReminderStatus::Pending,
        };
        assert!(reminder.is_due(now));
        reminder.status = ReminderStatus::Completed;
        assert!(!reminder.is_due(now));
        reminder.status = ReminderStatus::Pending;
        reminder.due_at = now + chrono::Duration::minutes(5);
        assert!(!reminder.is_due(now));
    }

    #[test]
    fn keys_are_lowercased() {
        assert_eq!(normalize_key("  Favourite Colour "), "favourite colour");
    }
}
