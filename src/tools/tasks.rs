//! To-do and reminder tools.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::memory::types::{now_local, parse_timestamp};
use crate::memory::{ReminderStore, TaskStatus, TaskStore};

use super::types::{Tool, ToolArgs, ToolError, first_str, optional_str, required_i64, required_str};

const TIME_FORMAT_HELP: &str =
    "Invalid time format. Please use 'in X minutes', 'HH:MM', or ISO format.";

/// Adds a task. Arguments: `description`.
pub struct AddTaskTool {
    store: Arc<dyn TaskStore>,
}

impl AddTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

impl Tool for AddTaskTool {
    fn name(&self) -> &str {
        "add_task"
    }
    fn description(&self) -> &str {
        "Add a task to the to-do list. Args: description."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let description = first_str(args, &["description", "task"])
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                ToolError::InvalidArgs("missing required argument: description".into())
            })?;
        let id = self.store.add_task(&description)?;
        Ok(format!("Task {id} added: {}", description.trim()))
    }
}

/// Lists tasks. Arguments: `status` (optional `pending` or `completed`).
pub struct ListTasksTool {
    store: Arc<dyn TaskStore>,
}

impl ListTasksTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

impl Tool for ListTasksTool {
    fn name(&self) -> &str {
        "list_tasks"
    }
    fn description(&self) -> &str {
        "List tasks. Args: status (optional: pending or completed)."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let status = match optional_str(args, "status").map(|s| s.trim().to_lowercase()) {
            None => None,
            Some(s) if s.is_empty() || s == "all" => None,
            Some(s) => Some(TaskStatus::parse(&s).ok_or_else(|| {
                ToolError::InvalidArgs("status must be 'pending' or 'completed'".into())
            })?),
        };
        let tasks = self.store.list_tasks(status)?;
        if tasks.is_empty() {
            return Ok("No tasks found.".to_owned());
        }
        let lines: Vec<String> = tasks
            .iter()
            .map(|t| {
                let icon = if t.status == TaskStatus::Completed {
                    "[x]"
                } else {
                    "[ ]"
                };
                format!("{}. {icon} {}", t.id, t.description)
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

/// Marks a task complete. Arguments: `task_id`.
pub struct CompleteTaskTool {
    store: Arc<dyn TaskStore>,
}

impl CompleteTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

impl Tool for CompleteTaskTool {
    fn name(&self) -> &str {
        "complete_task"
    }
    fn description(&self) -> &str {
        "Mark a task as completed. Args: task_id."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let id = if args.contains_key("task_id") {
            required_i64(args, "task_id")?
        } else {
            required_i64(args, "id")?
        };
        if self.store.complete_task(id)? {
            Ok(format!("Task {id} marked as complete."))
        } else {
            Err(ToolError::Execution(format!("Task {id} not found.")))
        }
    }
}

/// Schedules a reminder. Arguments: `message`, `time` (or `time_str`).
pub struct SetReminderTool {
    store: Arc<dyn ReminderStore>,
}

impl SetReminderTool {
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self { store }
    }
}

impl Tool for SetReminderTool {
    fn name(&self) -> &str {
        "set_reminder"
    }
    fn description(&self) -> &str {
        "Set a timed reminder. Args: message, time ('in 5 minutes', 'HH:MM' or ISO 'YYYY-MM-DDTHH:MM:SS')."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let message = required_str(args, "message")?;
        let time = first_str(args, &["time", "time_str", "when", "due_at"])
            .ok_or_else(|| ToolError::InvalidArgs(TIME_FORMAT_HELP.into()))?;
        let due_at = parse_due_time(&time, now_local())
            .ok_or_else(|| ToolError::InvalidArgs(TIME_FORMAT_HELP.into()))?;

        self.store.add_reminder(&message, due_at)?;
        Ok(format!(
            "Reminder set for {}: {}",
            due_at.format("%Y-%m-%d %H:%M:%S"),
            message.trim()
        ))
    }
}

/// Parse a reminder time relative to `now`.
///
/// Accepts `in N seconds|minutes|hours|days`, `HH:MM` (today, or tomorrow if
/// already past) and ISO-8601 local timestamps.
pub fn parse_due_time(input: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = input.trim().to_lowercase();

    if let Some(rest) = text.strip_prefix("in ") {
        let mut parts = rest.split_whitespace();
        let amount: i64 = parts.next()?.parse().ok()?;
        if amount < 0 {
            return None;
        }
        let unit = parts.next()?;
        let delta = if unit.starts_with("sec") {
            Duration::try_seconds(amount)?
        } else if unit.starts_with("min") {
            Duration::try_minutes(amount)?
        } else if unit.starts_with("hour") || unit.starts_with("hr") {
            Duration::try_hours(amount)?
        } else if unit.starts_with("day") {
            Duration::try_days(amount)?
        } else {
            return None;
        };
        return now.checked_add_signed(delta);
    }

    if let Ok(time) = NaiveTime::parse_from_str(&text, "%H:%M") {
        let today = now.date().and_time(time);
        return if today < now {
            today.checked_add_signed(Duration::days(1))
        } else {
            Some(today)
        };
    }

    parse_timestamp(input).or_else(|| NaiveDateTime::parse_from_str(input.trim(), "%Y-%m-%d %H:%M").ok())
}
