//! File tools, all confined to the files directory.
//!
//! - `read_file`, `list_files`: safe.
//! - `create_file`, `edit_file`, `write_file`, `delete_file`: destructive.

use std::path::PathBuf;

use super::path_validation::{display_path, resolve_in_sandbox, resolve_write_path, sandbox_root};
use super::types::{
    DEFAULT_MAX_BYTES, Tool, ToolArgs, ToolError, optional_str, required_str, truncate_output,
};

/// Maximum accepted content size for writes (1 MB).
const MAX_WRITE_BYTES: usize = 1024 * 1024;

/// Reads a text file.
///
/// Arguments: `path` (required).
pub struct ReadFileTool {
    root: PathBuf,
    max_bytes: usize,
}

impl ReadFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file. Args: path (relative to the files directory)."
    }

    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let path_arg = required_str(args, "path")?;
        let path = resolve_in_sandbox(&path_arg, &self.root)?;
        if !path.is_file() {
            return Err(ToolError::Execution(format!("File not found: {path_arg}")));
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ToolError::Execution(format!("Error reading file: {e}")))?;
        Ok(truncate_output(&content, self.max_bytes).0)
    }
}

/// Lists a directory.
///
/// Arguments: `directory` (optional, default the files directory itself).
pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in a directory. Args: directory (optional, relative to the files directory)."
    }

    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let dir_arg = optional_str(args, "directory")
            .or_else(|| optional_str(args, "path"))
            .unwrap_or_else(|| ".".to_owned());
        let dir = resolve_in_sandbox(&dir_arg, &self.root)?;
        if !dir.is_dir() {
            return Err(ToolError::Execution(format!(
                "Directory not found: {dir_arg}"
            )));
        }

        let entries = std::fs::read_dir(&dir)
            .map_err(|e| ToolError::Execution(format!("Error listing files: {e}")))?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                if entry.file_type().is_ok_and(|t| t.is_dir()) {
                    format!("{name}/")
                } else {
                    name
                }
            })
            .collect();
        names.sort();

        if names.is_empty() {
            Ok("(Empty directory)".to_owned())
        } else {
            Ok(names.join("\n"))
        }
    }
}

/// How a write tool treats existing files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// `create_file`: create, overwriting if present; parents are created.
    Create,
    /// `edit_file`: replace the content of an existing file.
    Edit,
    /// `write_file`: create or overwrite, or append with `append: true`.
    Write,
}

/// Writes file content. One type backs the three write tools.
///
/// Arguments: `path`, `content` (required); `append` (optional, `write_file` only).
pub struct WriteFileTool {
    root: PathBuf,
    mode: WriteMode,
}

impl WriteFileTool {
    pub fn new(root: PathBuf, mode: WriteMode) -> Self {
        Self { root, mode }
    }
}

impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        match self.mode {
            WriteMode::Create => "create_file",
            WriteMode::Edit => "edit_file",
            WriteMode::Write => "write_file",
        }
    }

    fn description(&self) -> &str {
        match self.mode {
            WriteMode::Create => {
                "Create a file with content (overwrites if it exists). Args: path, content."
            }
            WriteMode::Edit => {
                "Replace the full content of an existing file. Args: path, content."
            }
            WriteMode::Write => {
                "Write content to a file. Args: path, content, append (optional true/false)."
            }
        }
    }

    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let path_arg = required_str(args, "path")?;
        let content = optional_str(args, "content")
            .ok_or_else(|| ToolError::InvalidArgs("missing required argument: content".into()))?;
        if content.len() > MAX_WRITE_BYTES {
            return Err(ToolError::InvalidArgs(format!(
                "content exceeds max size ({} bytes > {MAX_WRITE_BYTES} bytes)",
                content.len()
            )));
        }

        let path = resolve_write_path(&path_arg, &self.root)?;
        let root = sandbox_root(&self.root)?;
        let shown = display_path(&path, &root);

        if path.is_dir() {
            return Err(ToolError::Execution(format!("{shown} is a directory")));
        }
        if self.mode == WriteMode::Edit && !path.is_file() {
            return Err(ToolError::Execution(format!("File not found: {path_arg}")));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolError::Execution(format!("Error creating directory: {e}")))?;
        }

        let append = self.mode == WriteMode::Write
            && args
                .get("append")
                .is_some_and(|v| v.as_bool() == Some(true) || v.as_str() == Some("true"));

        let result = if append {
            use std::io::Write;
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .and_then(|mut f| f.write_all(content.as_bytes()))
        } else {
            std::fs::write(&path, &content)
        };
        result.map_err(|e| ToolError::Execution(format!("Error writing file: {e}")))?;

        Ok(match (self.mode, append) {
            (WriteMode::Create, _) => format!("Successfully created file: {shown}"),
            (WriteMode::Edit, _) => format!("Successfully updated file: {shown}"),
            (WriteMode::Write, true) => {
                format!("Appended {} bytes to {shown}", content.len())
            }
            (WriteMode::Write, false) => format!("Wrote {} bytes to {shown}", content.len()),
        })
    }
}

/// Deletes a single file (never a directory).
///
/// Arguments: `path` (required).
pub struct DeleteFileTool {
    root: PathBuf,
}

impl DeleteFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file. Args: path."
    }

    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let path_arg = required_str(args, "path")?;
        let path = resolve_write_path(&path_arg, &self.root)?;
        if !path.is_file() {
            return Err(ToolError::Execution(format!("File not found: {path_arg}")));
        }
        std::fs::remove_file(&path)
            .map_err(|e| ToolError::Execution(format!("Error deleting file: {e}")))?;
        Ok(format!("Deleted file: {path_arg}"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::{Value, json};

    fn args(value: Value) -> ToolArgs {
        match value {
            Value::Object(map) => map,
            _ => ToolArgs::new(),
        }
    }

    #[test]
    fn create_read_and_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();

        let create = WriteFileTool::new(root.clone(), WriteMode::Create);
        let out = create
            .execute(&args(json!({"path": "notes/todo.txt", "content": "buy milk"})))
            .expect("create");
        assert!(out.contains("notes/todo.txt"), "{out}");

        let read = ReadFileTool::new(root.clone());
        assert_eq!(
            read.execute(&args(json!({"path": "notes/todo.txt"})))
                .expect("read"),
            "buy milk"
        );

        let list = ListFilesTool::new(root);
        assert_eq!(list.execute(&ToolArgs::new()).expect("list"), "notes/");
        assert_eq!(
            list.execute(&args(json!({"directory": "notes"})))
                .expect("list notes"),
            "todo.txt"
        );
    }

    #[test]
    fn edit_requires_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let edit = WriteFileTool::new(dir.path().to_path_buf(), WriteMode::Edit);
        assert!(
            edit.execute(&args(json!({"path": "missing.txt", "content": "x"})))
                .is_err()
        );

        std::fs::write(dir.path().join("present.txt"), "old").expect("seed");
        edit.execute(&args(json!({"path": "present.txt", "content": "new"})))
            .expect("edit");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("present.txt")).expect("read"),
            "new"
        );
    }

    #[test]
    fn write_file_appends_on_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let write = WriteFileTool::new(dir.path().to_path_buf(), WriteMode::Write);
        write
            .execute(&args(json!({"path": "log.txt", "content": "a"})))
            .expect("write");
        write
            .execute(&args(json!({"path": "log.txt", "content": "b", "append": true})))
            .expect("append");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("log.txt")).expect("read"),
            "ab"
        );
    }

    #[test]
    fn delete_removes_only_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("gone.txt"), "x").expect("seed");
        std::fs::create_dir(dir.path().join("folder")).expect("mkdir");
        let delete = DeleteFileTool::new(dir.path().to_path_buf());

        delete
            .execute(&args(json!({"path": "gone.txt"})))
            .expect("delete");
        assert!(!dir.path().join("gone.txt").exists());
        assert!(delete.execute(&args(json!({"path": "folder"}))).is_err());
    }

    #[test]
    fn escapes_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        let read = ReadFileTool::new(root.clone());
        assert!(read.execute(&args(json!({"path": "../etc/passwd"}))).is_err());
        assert!(read.execute(&args(json!({"path": "/etc/passwd"}))).is_err());

        let create = WriteFileTool::new(root, WriteMode::Create);
        assert!(
            create
                .execute(&args(json!({"path": "/tmp/escape.txt", "content": "x"})))
                .is_err()
        );
    }

    #[test]
    fn empty_directory_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let list = ListFilesTool::new(dir.path().to_path_buf());
        assert_eq!(list.execute(&ToolArgs::new()).expect("list"), "(Empty directory)");
    }
}
