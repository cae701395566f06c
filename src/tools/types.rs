//! Core tool types.
//!
//! Defines the [`Tool`] trait every capability implements, the argument map
//! tools receive, and [`ToolError`].

use serde_json::{Map, Value};

use crate::memory::StoreError;

/// Maximum size of a tool result fed back to the generator (16 KB).
pub const DEFAULT_MAX_BYTES: usize = 16 * 1024;

/// JSON arguments of a tool call.
pub type ToolArgs = Map<String, Value>;

/// Whether a tool may run without asking the user first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSafety {
    Safe,
    /// Staged until the user confirms.
    Destructive,
}

/// Errors raised at the tool boundary.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Execution(String),

    #[error("tool panicked: {0}")]
    Panicked(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Core trait for assistant tools.
///
/// Tools are synchronous and run on the conversation thread.
pub trait Tool: Send + Sync {
    /// Name the generator uses in `{"tool": ...}`.
    fn name(&self) -> &str;

    /// One-line description including the accepted arguments.
    fn description(&self) -> &str;

    /// Execute with the given arguments and return the result text.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for missing arguments or failed execution.
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError>;
}

/// Fetch a required string argument. Numbers and booleans are stringified.
pub fn required_str(args: &ToolArgs, name: &str) -> Result<String, ToolError> {
    optional_str(args, name)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArgs(format!("missing required argument: {name}")))
}

/// Fetch an optional string argument. Numbers and booleans are stringified.
pub fn optional_str(args: &ToolArgs, name: &str) -> Option<String> {
    match args.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Fetch the first present string argument among `names`.
///
/// Generators are loose with argument names (`time` vs `time_str`).
pub fn first_str(args: &ToolArgs, names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| optional_str(args, n))
}

/// Fetch a required integer argument, accepting numeric strings.
pub fn required_i64(args: &ToolArgs, name: &str) -> Result<i64, ToolError> {
    let invalid = || ToolError::InvalidArgs(format!("{name} must be an integer"));
    match args.get(name) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(ToolError::InvalidArgs(format!(
            "missing required argument: {name}"
        ))),
    }
}

/// Truncate a string to at most `max_bytes`, respecting UTF-8 boundaries.
///
/// Returns `(truncated_string, was_truncated)`.
pub fn truncate_output(s: &str, max_bytes: usize) -> (String, bool) {
    if s.len() <= max_bytes {
        return (s.to_string(), false);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    (
        format!("{}\n\n[output truncated at {max_bytes} bytes]", &s[..end]),
        true,
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;

    fn args(value: Value) -> ToolArgs {
        match value {
            Value::Object(map) => map,
            _ => ToolArgs::new(),
        }
    }

    #[test]
    fn required_str_rejects_missing_and_blank() {
        let a = args(json!({"path": "  ", "n": 3}));
        assert!(matches!(
            required_str(&a, "path"),
            Err(ToolError::InvalidArgs(_))
        ));
        assert!(required_str(&a, "absent").is_err());
        assert_eq!(required_str(&a, "n").expect("number"), "3");
    }

    #[test]
    fn first_str_prefers_earlier_names() {
        let a = args(json!({"time_str": "10:30", "time": "in 5 minutes"}));
        assert_eq!(first_str(&a, &["time", "time_str"]).as_deref(), Some("in 5 minutes"));
        assert_eq!(first_str(&a, &["when"]), None);
    }

    #[test]
    fn required_i64_accepts_numeric_strings() {
        let a = args(json!({"id": "7", "other": 3, "bad": "seven"}));
        assert_eq!(required_i64(&a, "id").expect("id"), 7);
        assert_eq!(required_i64(&a, "other").expect("other"), 3);
        assert!(required_i64(&a, "bad").is_err());
        assert!(required_i64(&a, "missing").is_err());
    }

    #[test]
    fn truncate_output_respects_utf8_boundary() {
        let (output, truncated) = truncate_output("ééééé", 5);
        assert!(truncated);
        assert!(output.starts_with("éé"));
        assert!(output.contains("[output truncated at 5 bytes]"));

        let (output, truncated) = truncate_output("short", 100);
        assert_eq!(output, "short");
        assert!(!truncated);
    }
}
