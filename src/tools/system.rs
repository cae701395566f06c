//! Clock, system information and desktop launch tools.
//!
//! Launching goes through the [`Launcher`] trait so tests can record launch
//! requests instead of opening windows.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use chrono::Local;
use tracing::info;

use super::path_validation::{display_path, resolve_in_sandbox, sandbox_root};
use super::types::{Tool, ToolArgs, ToolError, first_str, required_str};

/// Applications `open_app` may start.
pub const ALLOWED_APPS: &[&str] = &["browser", "calculator", "code", "files", "terminal"];

/// Something the desktop should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// A whitelisted application by name.
    App(String),
    /// A file or folder, opened with the platform default handler.
    Path(PathBuf),
    /// A terminal window in the given directory.
    Terminal(PathBuf),
    /// The code editor on the given directory.
    Editor(PathBuf),
}

/// Starts desktop programs.
pub trait Launcher: Send + Sync {
    /// # Errors
    ///
    /// Returns an I/O error if no suitable program exists or it fails to spawn.
    fn launch(&self, target: &LaunchTarget) -> std::io::Result<()>;
}

/// Launcher using the platform opener (`open`, `xdg-open`, `cmd /C start`).
#[derive(Debug, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, target: &LaunchTarget) -> std::io::Result<()> {
        let mut cmd = launch_command(target)?;
        info!(?target, "launching");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }
}

fn launch_command(target: &LaunchTarget) -> std::io::Result<Command> {
    let not_found = |what: &str| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no program available to open {what}"),
        )
    };

    let (program, args): (String, Vec<String>) = match target {
        LaunchTarget::Path(path) => opener(path.to_string_lossy().as_ref())?,
        LaunchTarget::Editor(dir) => {
            let editor = which::which("code").map_err(|_| not_found("the code editor"))?;
            (
                editor.to_string_lossy().to_string(),
                vec![dir.to_string_lossy().to_string()],
            )
        }
        LaunchTarget::Terminal(dir) => terminal_command(dir).ok_or_else(|| not_found("a terminal"))?,
        LaunchTarget::App(name) => match name.as_str() {
            "browser" => opener("https://www.google.com")?,
            "files" => {
                let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
                opener(home.to_string_lossy().as_ref())?
            }
            "code" => {
                let editor = which::which("code").map_err(|_| not_found("the code editor"))?;
                (editor.to_string_lossy().to_string(), Vec::new())
            }
            "terminal" => {
                let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
                terminal_command(&home).ok_or_else(|| not_found("a terminal"))?
            }
            "calculator" => calculator_command().ok_or_else(|| not_found("a calculator"))?,
            other => return Err(not_found(other)),
        },
    };

    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}

fn opener(target: &str) -> std::io::Result<(String, Vec<String>)> {
    if cfg!(target_os = "macos") {
        Ok(("open".to_owned(), vec![target.to_owned()]))
    } else if cfg!(windows) {
        Ok((
            "cmd".to_owned(),
            vec!["/C".into(), "start".into(), String::new(), target.to_owned()],
        ))
    } else {
        which::which("xdg-open")
            .map(|p| (p.to_string_lossy().to_string(), vec![target.to_owned()]))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))
    }
}

fn terminal_command(dir: &Path) -> Option<(String, Vec<String>)> {
    let dir = dir.to_string_lossy().to_string();
    if cfg!(target_os = "macos") {
        return Some(("open".to_owned(), vec!["-a".into(), "Terminal".into(), dir]));
    }
    if cfg!(windows) {
        return Some((
            "cmd".to_owned(),
            vec!["/C".into(), "start".into(), "cmd".into(), "/K".into(), format!("cd /d {dir}")],
        ));
    }
    ["x-terminal-emulator", "gnome-terminal", "konsole", "xterm"]
        .iter()
        .find_map(|name| which::which(name).ok())
        .map(|p| {
            let program = p.to_string_lossy().to_string();
            let args = if program.ends_with("gnome-terminal") {
                vec![format!("--working-directory={dir}")]
            } else {
                Vec::new()
            };
            (program, args)
        })
}

fn calculator_command() -> Option<(String, Vec<String>)> {
    if cfg!(target_os = "macos") {
        return Some(("open".to_owned(), vec!["-a".into(), "Calculator".into()]));
    }
    if cfg!(windows) {
        return Some(("calc.exe".to_owned(), Vec::new()));
    }
    ["gnome-calculator", "kcalc", "galculator"]
        .iter()
        .find_map(|name| which::which(name).ok())
        .map(|p| (p.to_string_lossy().to_string(), Vec::new()))
}

/// Current local time.
pub struct GetTimeTool;

impl Tool for GetTimeTool {
    fn name(&self) -> &str {
        "get_time"
    }
    fn description(&self) -> &str {
        "Get the current local time. No args."
    }
    fn execute(&self, _args: &ToolArgs) -> Result<String, ToolError> {
        Ok(format!("Current time is {}", Local::now().format("%I:%M %p")))
    }
}

/// Current local date.
pub struct GetDateTool;

impl Tool for GetDateTool {
    fn name(&self) -> &str {
        "get_date"
    }
    fn description(&self) -> &str {
        "Get the current date. No args."
    }
    fn execute(&self, _args: &ToolArgs) -> Result<String, ToolError> {
        Ok(format!("Today is {}", Local::now().format("%A, %B %d, %Y")))
    }
}

/// OS, CPU and memory summary.
pub struct SystemInfoTool;

impl Tool for SystemInfoTool {
    fn name(&self) -> &str {
        "system_info"
    }
    fn description(&self) -> &str {
        "Get system information (OS, CPU, memory). No args."
    }
    fn execute(&self, _args: &ToolArgs) -> Result<String, ToolError> {
        let mut parts = vec![format!(
            "OS: {} {}",
            std::env::consts::OS,
            std::env::consts::ARCH
        )];
        if let Some(cpu) = detect_cpu() {
            parts.push(format!("CPU: {cpu}"));
        }
        if let Ok(n) = std::thread::available_parallelism() {
            parts.push(format!("Cores: {n}"));
        }
        match detect_total_memory_bytes() {
            Some(bytes) => parts.push(format!("Memory: {} GB", bytes / (1024 * 1024 * 1024))),
            None => parts.push("Memory: unknown".to_owned()),
        }
        Ok(parts.join(" | "))
    }
}

fn run_cmd(args: &[&str]) -> Option<String> {
    let (program, rest) = args.split_first()?;
    let out = Command::new(program).args(rest).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let trimmed = String::from_utf8(out.stdout).ok()?.trim().to_owned();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn detect_total_memory_bytes() -> Option<u64> {
    if cfg!(target_os = "macos") {
        return run_cmd(&["sysctl", "-n", "hw.memsize"])?.parse::<u64>().ok();
    }
    if cfg!(target_os = "linux") {
        let content = std::fs::read_to_string("/proc/meminfo").ok()?;
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:")
                && let Some(kb) = rest.split_whitespace().next()
                && let Ok(kb) = kb.parse::<u64>()
            {
                return Some(kb.saturating_mul(1024));
            }
        }
    }
    None
}

fn detect_cpu() -> Option<String> {
    if cfg!(target_os = "macos") {
        return run_cmd(&["sysctl", "-n", "machdep.cpu.brand_string"]);
    }
    if cfg!(target_os = "linux") {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix("model name")
                && let Some((_, v)) = rest.split_once(':')
            {
                let v = v.trim();
                if !v.is_empty() {
                    return Some(v.to_owned());
                }
            }
        }
    }
    None
}

/// Opens a whitelisted application.
///
/// Arguments: `app_name` (or `name`).
pub struct OpenAppTool {
    launcher: Arc<dyn Launcher>,
}

impl OpenAppTool {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self { launcher }
    }
}

impl Tool for OpenAppTool {
    fn name(&self) -> &str {
        "open_app"
    }
    fn description(&self) -> &str {
        "Open an application. Args: app_name (one of browser, calculator, code, files, terminal)."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let requested = first_str(args, &["app_name", "name", "app"])
            .ok_or_else(|| ToolError::InvalidArgs("missing required argument: app_name".into()))?;
        let key = requested.trim().to_lowercase();
        let key = match key.as_str() {
            "vscode" | "vs code" | "editor" => "code".to_owned(),
            "chrome" | "web browser" => "browser".to_owned(),
            "explorer" | "finder" => "files".to_owned(),
            "cmd" | "shell" => "terminal".to_owned(),
            _ => key,
        };
        if !ALLOWED_APPS.contains(&key.as_str()) {
            return Err(ToolError::Execution(format!(
                "App '{requested}' is not in the whitelist. Allowed: {}",
                ALLOWED_APPS.join(", ")
            )));
        }
        self.launcher
            .launch(&LaunchTarget::App(key))
            .map_err(|e| ToolError::Execution(format!("Error opening {requested}: {e}")))?;
        Ok(format!("Opened {requested}."))
    }
}

/// Opens a folder inside the files directory (default: the directory itself).
///
/// Arguments: `path` (optional).
pub struct OpenFolderTool {
    root: PathBuf,
    launcher: Arc<dyn Launcher>,
}

impl OpenFolderTool {
    pub fn new(root: PathBuf, launcher: Arc<dyn Launcher>) -> Self {
        Self { root, launcher }
    }
}

impl Tool for OpenFolderTool {
    fn name(&self) -> &str {
        "open_folder"
    }
    fn description(&self) -> &str {
        "Open a folder in the file manager. Args: path (optional, inside the files directory)."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let path_arg = first_str(args, &["path", "folder"]).unwrap_or_else(|| ".".to_owned());
        let root = sandbox_root(&self.root)?;
        let path = resolve_in_sandbox(&path_arg, &self.root).map_err(|_| {
            ToolError::Execution("Access restricted. Only the files directory can be opened.".into())
        })?;
        if !path.is_dir() {
            return Err(ToolError::Execution(format!("Folder not found: {path_arg}")));
        }
        self.launcher
            .launch(&LaunchTarget::Path(path.clone()))
            .map_err(|e| ToolError::Execution(format!("Error opening folder: {e}")))?;
        Ok(format!("Opened folder: {}", display_path(&path, &root)))
    }
}

/// Opens a file inside the files directory with its default application.
///
/// Arguments: `path` (required).
pub struct OpenFileTool {
    root: PathBuf,
    launcher: Arc<dyn Launcher>,
}

impl OpenFileTool {
    pub fn new(root: PathBuf, launcher: Arc<dyn Launcher>) -> Self {
        Self { root, launcher }
    }
}

impl Tool for OpenFileTool {
    fn name(&self) -> &str {
        "open_file"
    }
    fn description(&self) -> &str {
        "Open a file with its default application. Args: path (inside the files directory)."
    }
    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let path_arg = required_str(args, "path")?;
        let root = sandbox_root(&self.root)?;
        let path = resolve_in_sandbox(&path_arg, &self.root).map_err(|_| {
            ToolError::Execution(
                "Access restricted. Only files in the files directory can be opened.".into(),
            )
        })?;
        if !path.is_file() {
            return Err(ToolError::Execution(format!("File not found: {path_arg}")));
        }
        self.launcher
            .launch(&LaunchTarget::Path(path.clone()))
            .map_err(|e| ToolError::Execution(format!("Error opening file: {e}")))?;
        Ok(format!("Opened file: {}", display_path(&path, &root)))
    }
}

/// Starts the coding workflow: editor, file manager and a terminal, all on
/// the files directory. Partial failures are reported line by line.
pub struct StartCodingTool {
    root: PathBuf,
    launcher: Arc<dyn Launcher>,
}

impl StartCodingTool {
    pub fn new(root: PathBuf, launcher: Arc<dyn Launcher>) -> Self {
        Self { root, launcher }
    }
}

impl Tool for StartCodingTool {
    fn name(&self) -> &str {
        "start_coding"
    }
    fn description(&self) -> &str {
        "Start the coding environment: editor, files folder and a terminal. No args."
    }
    fn execute(&self, _args: &ToolArgs) -> Result<String, ToolError> {
        let root = sandbox_root(&self.root)?;
        let steps = [
            (LaunchTarget::Editor(root.clone()), "Opened the code editor."),
            (LaunchTarget::Path(root.clone()), "Opened the files folder."),
            (
                LaunchTarget::Terminal(root.clone()),
                "Opened a terminal in the files folder.",
            ),
        ];
        let lines: Vec<String> = steps
            .iter()
            .map(|(target, ok)| match self.launcher.launch(target) {
                Ok(()) => (*ok).to_owned(),
                Err(e) => format!("Error: {e}"),
            })
            .collect();
        Ok(lines.join("\n"))
    }
}
