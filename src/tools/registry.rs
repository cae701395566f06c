//! Tool registry with explicit safety metadata.
//!
//! The [`ToolRegistry`] is an explicit table of name → capability. Every
//! entry carries a [`ToolSafety`] tag; [`ToolRegistry::is_destructive`] also
//! consults the fixed [`DESTRUCTIVE_TOOLS`] list so a tool with one of those
//! names is never run unconfirmed, whatever it was registered as.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, warn};

use super::types::{Tool, ToolArgs, ToolError, ToolSafety};

/// Tools that always require confirmation.
pub const DESTRUCTIVE_TOOLS: &[&str] = &[
    "create_file",
    "edit_file",
    "write_file",
    "run_command",
    "delete_file",
    "delete_fact",
    "update_fact",
];

struct Entry {
    tool: Arc<dyn Tool>,
    safety: ToolSafety,
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>, safety: ToolSafety) {
        self.tools
            .insert(tool.name().to_owned(), Entry { tool, safety });
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|e| Arc::clone(&e.tool))
    }

    /// Check if a tool exists in the registry.
    pub fn exists(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether running `name` must be confirmed first.
    ///
    /// Unknown names on the fixed list are destructive; other unknown names
    /// are not (they fail with [`ToolError::NotFound`] anyway).
    pub fn is_destructive(&self, name: &str) -> bool {
        DESTRUCTIVE_TOOLS.contains(&name)
            || self
                .tools
                .get(name)
                .is_some_and(|e| e.safety == ToolSafety::Destructive)
    }

    /// Execute a tool. A panic inside the tool is caught and reported as
    /// [`ToolError::Panicked`].
    ///
    /// # Errors
    ///
    /// [`ToolError::NotFound`] for unknown names, otherwise whatever the tool
    /// returned.
    pub fn execute(&self, name: &str, args: &ToolArgs) -> Result<String, ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_owned()))?;

        debug!(tool = name, "executing tool");
        match catch_unwind(AssertUnwindSafe(|| entry.tool.execute(args))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(tool = name, "tool panicked: {message}");
                Err(ToolError::Panicked(message))
            }
        }
    }

    /// Execute a tool and convert every outcome into a result string.
    pub fn dispatch(&self, name: &str, args: &ToolArgs) -> String {
        match self.execute(name, args) {
            Ok(output) => output,
            Err(ToolError::NotFound(_)) => format!("Error: Tool '{name}' not found."),
            Err(e) => {
                warn!(tool = name, "tool failed: {e}");
                format!("Error executing '{name}': {e}")
            }
        }
    }

    /// `- name: description` lines for the system prompt, sorted by name.
    pub fn describe(&self) -> String {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let entry = self.tools.get(name)?;
                Some(format!("- {name}: {}", entry.tool.description()))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
