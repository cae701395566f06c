//! Tool system: named capabilities the language model can call.
//!
//! Every tool implements [`Tool`] and is registered in a [`ToolRegistry`]
//! together with an explicit [`ToolSafety`] tag. Destructive tools are staged
//! by the dialogue layer and only run after the user agrees.
//!
//! # Tools
//!
//! - **get_time / get_date / system_info**: clock and machine facts
//! - **read_file / list_files**: read-only access to the files directory
//! - **create_file / edit_file / write_file / delete_file**: file mutation (destructive)
//! - **run_command**: shell command in the files directory (destructive)
//! - **open_app / open_folder / open_file / start_coding**: desktop launches
//! - **store_fact / get_fact / list_memories**: long-term memory
//! - **update_fact / delete_fact**: memory mutation (destructive)
//! - **add_task / list_tasks / complete_task / set_reminder**: to-dos and reminders

pub mod command;
pub mod files;
pub mod memory;
pub mod path_validation;
pub mod registry;
pub mod system;
pub mod tasks;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use crate::memory::{FactStore, ReminderStore, TaskStore};

pub use command::RunCommandTool;
pub use files::{DeleteFileTool, ListFilesTool, ReadFileTool, WriteFileTool, WriteMode};
pub use memory::{DeleteFactTool, GetFactTool, ListMemoriesTool, StoreFactTool, UpdateFactTool};
pub use registry::{DESTRUCTIVE_TOOLS, ToolRegistry};
pub use system::{
    GetDateTool, GetTimeTool, LaunchTarget, Launcher, OpenAppTool, OpenFileTool, OpenFolderTool,
    StartCodingTool, SystemInfoTool, SystemLauncher,
};
pub use tasks::{AddTaskTool, CompleteTaskTool, ListTasksTool, SetReminderTool, parse_due_time};
pub use types::{Tool, ToolArgs, ToolError, ToolSafety, truncate_output};

/// Stores the built-in tools operate on.
#[derive(Clone)]
pub struct ToolContext {
    /// Sandbox directory for file tools and `run_command`.
    pub files_dir: PathBuf,
    pub facts: Arc<dyn FactStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub reminders: Arc<dyn ReminderStore>,
    pub launcher: Arc<dyn Launcher>,
}

/// Build the registry holding every built-in tool.
pub fn builtin_registry(ctx: &ToolContext) -> ToolRegistry {
    use ToolSafety::{Destructive, Safe};

    let root = ctx.files_dir.clone();
    let launcher = &ctx.launcher;
    let mut reg = ToolRegistry::new();

    let safe: Vec<Arc<dyn Tool>> = vec![
        Arc::new(GetTimeTool),
        Arc::new(GetDateTool),
        Arc::new(SystemInfoTool),
        Arc::new(ReadFileTool::new(root.clone())),
        Arc::new(ListFilesTool::new(root.clone())),
        Arc::new(OpenAppTool::new(Arc::clone(launcher))),
        Arc::new(OpenFolderTool::new(root.clone(), Arc::clone(launcher))),
        Arc::new(OpenFileTool::new(root.clone(), Arc::clone(launcher))),
        Arc::new(StartCodingTool::new(root.clone(), Arc::clone(launcher))),
        Arc::new(StoreFactTool::new(Arc::clone(&ctx.facts))),
        Arc::new(GetFactTool::new(Arc::clone(&ctx.facts))),
        Arc::new(ListMemoriesTool::new(Arc::clone(&ctx.facts))),
        Arc::new(AddTaskTool::new(Arc::clone(&ctx.tasks))),
        Arc::new(ListTasksTool::new(Arc::clone(&ctx.tasks))),
        Arc::new(CompleteTaskTool::new(Arc::clone(&ctx.tasks))),
        Arc::new(SetReminderTool::new(Arc::clone(&ctx.reminders))),
    ];
    for tool in safe {
        reg.register(tool, Safe);
    }

    let destructive: Vec<Arc<dyn Tool>> = vec![
        Arc::new(WriteFileTool::new(root.clone(), WriteMode::Create)),
        Arc::new(WriteFileTool::new(root.clone(), WriteMode::Edit)),
        Arc::new(WriteFileTool::new(root.clone(), WriteMode::Write)),
        Arc::new(DeleteFileTool::new(root.clone())),
        Arc::new(RunCommandTool::new(root)),
        Arc::new(UpdateFactTool::new(Arc::clone(&ctx.facts))),
        Arc::new(DeleteFactTool::new(Arc::clone(&ctx.facts))),
    ];
    for tool in destructive {
        reg.register(tool, Destructive);
    }

    reg
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::memory::SqliteStore;
    use std::io;

    struct NoopLauncher;

    impl Launcher for NoopLauncher {
        fn launch(&self, _target: &LaunchTarget) -> io::Result<()> {
            Ok(())
        }
    }

    fn registry(dir: &std::path::Path) -> ToolRegistry {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        builtin_registry(&ToolContext {
            files_dir: dir.to_path_buf(),
            facts: store.clone(),
            tasks: store.clone(),
            reminders: store,
            launcher: Arc::new(NoopLauncher),
        })
    }

    #[test]
    fn registers_every_builtin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reg = registry(dir.path());
        assert_eq!(reg.names().len(), 23);
        for name in DESTRUCTIVE_TOOLS {
            assert!(reg.exists(name), "{name} missing");
            assert!(reg.is_destructive(name), "{name} not destructive");
        }
        for name in ["get_time", "read_file", "store_fact", "set_reminder", "open_app"] {
            assert!(reg.exists(name));
            assert!(!reg.is_destructive(name), "{name} should be safe");
        }
    }

    #[test]
    fn describe_lists_tools_for_the_prompt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let text = registry(dir.path()).describe();
        assert!(text.contains("- get_time: "));
        assert!(text.contains("- delete_fact: "));
    }
}
