//! Fact tools over a [`FactStore`].
//!
//! `update_fact` and `delete_fact` are destructive; the rest are safe.

use std::sync::Arc;

use crate::memory::FactStore;

use super::types::{Tool, ToolArgs, ToolError, optional_str, required_str};

const DEFAULT_CATEGORY: &str = "general";

/// Stores or replaces a fact. Arguments: `key`, `value`, `category` (optional).
pub struct StoreFactTool {
    store: Arc<dyn FactStore>,
}

impl StoreFactTool {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }
}

impl Tool for StoreFactTool {
    fn name(&self) -> &str {
        "store_fact"
    }
    fn description(&self) -> &str {
        "Store a fact about the user. Args: key, value, category (optional)."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let key = required_str(args, "key")?;
        let value = required_str(args, "value")?;
        let category = optional_str(args, "category")
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());
        self.store.store_fact(&key, &value, Some(&category))?;
        Ok(format!("Stored: {} = {value} ({category})", key.to_lowercase()))
    }
}

/// Exact lookup, falling back to a substring search. Arguments: `key`.
pub struct GetFactTool {
    store: Arc<dyn FactStore>,
}

impl GetFactTool {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }
}

impl Tool for GetFactTool {
    fn name(&self) -> &str {
        "get_fact"
    }
    fn description(&self) -> &str {
        "Retrieve a fact by key, or search facts by keyword. Args: key."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let key = required_str(args, "key")?;
        if let Some(fact) = self.store.get_fact(&key)? {
            return Ok(match fact.category {
                Some(category) => format!("{}: {} ({category})", fact.key, fact.value),
                None => format!("{}: {}", fact.key, fact.value),
            });
        }

        let hits = self.store.search_facts(&key)?;
        if hits.is_empty() {
            return Ok(format!("No facts found for '{key}'."));
        }
        let lines: Vec<String> = hits
            .iter()
            .map(|f| format!("{}: {}", f.key, f.value))
            .collect();
        Ok(format!("Found related memories:\n{}", lines.join("\n")))
    }
}

/// Changes an existing fact's value. Arguments: `key`, `value`.
pub struct UpdateFactTool {
    store: Arc<dyn FactStore>,
}

impl UpdateFactTool {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }
}

impl Tool for UpdateFactTool {
    fn name(&self) -> &str {
        "update_fact"
    }
    fn description(&self) -> &str {
        "Update the value of an existing fact. Args: key, value."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let key = required_str(args, "key")?;
        let value = required_str(args, "value")?;
        if self.store.update_fact(&key, &value)? {
            Ok(format!("Updated: {key} = {value}"))
        } else {
            Err(ToolError::Execution(format!(
                "Could not update '{key}'. It might not exist."
            )))
        }
    }
}

/// Removes a fact. Arguments: `key`.
pub struct DeleteFactTool {
    store: Arc<dyn FactStore>,
}

impl DeleteFactTool {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }
}

impl Tool for DeleteFactTool {
    fn name(&self) -> &str {
        "delete_fact"
    }
    fn description(&self) -> &str {
        "Delete a stored fact. Args: key."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let key = required_str(args, "key")?;
        if self.store.delete_fact(&key)? {
            Ok(format!("Deleted memory: {key}"))
        } else {
            Err(ToolError::Execution(format!(
                "Could not delete '{key}'. It might not exist."
            )))
        }
    }
}

/// Lists every fact. No arguments.
pub struct ListMemoriesTool {
    store: Arc<dyn FactStore>,
}

impl ListMemoriesTool {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }
}

impl Tool for ListMemoriesTool {
    fn name(&self) -> &str {
        "list_memories"
    }
    fn description(&self) -> &str {
        "List all stored facts. No args."
    }
    fn execute(&self, _args: &ToolArgs) -> Result<String, ToolError> {
        let facts = self.store.list_facts()?;
        if facts.is_empty() {
            return Ok("Memory is empty.".to_owned());
        }
        let lines: Vec<String> = facts
            .iter()
            .map(|f| {
                format!(
                    "- {}: {} ({})",
                    f.key,
                    f.value,
                    f.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
                )
            })
            .collect();
        Ok(format!("Current Memories:\n{}", lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::memory::SqliteStore;
    use serde_json::{Value, json};

    fn args(value: Value) -> ToolArgs {
        match value {
            Value::Object(map) => map,
            _ => ToolArgs::new(),
        }
    }

    fn store() -> Arc<dyn FactStore> {
        Arc::new(SqliteStore::open_in_memory().expect("store"))
    }

    #[test]
    fn store_then_get_exact_and_search() {
        let store = store();
        let put = StoreFactTool::new(Arc::clone(&store));
        let get = GetFactTool::new(Arc::clone(&store));

        assert_eq!(
            put.execute(&args(json!({"key": "Editor", "value": "Helix"})))
                .expect("store"),
            "Stored: editor = Helix (general)"
        );
        assert_eq!(
            get.execute(&args(json!({"key": "editor"}))).expect("get"),
            "editor: Helix (general)"
        );
        assert_eq!(
            get.execute(&args(json!({"key": "hel"}))).expect("search"),
            "Found related memories:\neditor: Helix"
        );
        assert_eq!(
            get.execute(&args(json!({"key": "pets"}))).expect("miss"),
            "No facts found for 'pets'."
        );
    }

    #[test]
    fn update_and_delete_missing_keys_fail() {
        let store = store();
        let update = UpdateFactTool::new(Arc::clone(&store));
        let delete = DeleteFactTool::new(Arc::clone(&store));
        assert!(update.execute(&args(json!({"key": "x", "value": "y"}))).is_err());
        assert!(delete.execute(&args(json!({"key": "x"}))).is_err());

        store.store_fact("x", "1", None).expect("seed");
        assert_eq!(
            update
                .execute(&args(json!({"key": "x", "value": "2"})))
                .expect("update"),
            "Updated: x = 2"
        );
        assert_eq!(
            delete.execute(&args(json!({"key": "x"}))).expect("delete"),
            "Deleted memory: x"
        );
    }

    #[test]
    fn list_memories_formats_categories() {
        let store = store();
        let list = ListMemoriesTool::new(Arc::clone(&store));
        assert_eq!(list.execute(&ToolArgs::new()).expect("empty"), "Memory is empty.");

        store.store_fact("name", "Mohan", None).expect("seed");
        assert_eq!(
            list.execute(&ToolArgs::new()).expect("list"),
            "Current Memories:\n- name: Mohan (general)"
        );
    }
}
