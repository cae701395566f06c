//! `run_command`: executes a shell command in the files directory with a
//! timeout and bounded output.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::path_validation::sandbox_root;
use super::types::{DEFAULT_MAX_BYTES, Tool, ToolArgs, ToolError, required_str, truncate_output};

/// Default command timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound a caller may request with `timeout`.
const MAX_TIMEOUT_SECS: u64 = 300;

/// Runs `/bin/sh -c <command>` (or `cmd /C` on Windows) with the files
/// directory as working directory.
///
/// Arguments: `command` (required), `timeout` (optional seconds).
pub struct RunCommandTool {
    root: PathBuf,
    max_bytes: usize,
    timeout_secs: u64,
}

impl RunCommandTool {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_bytes: DEFAULT_MAX_BYTES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Override output bound and default timeout.
    pub fn with_config(root: PathBuf, max_bytes: usize, timeout_secs: u64) -> Self {
        Self {
            root,
            max_bytes,
            timeout_secs,
        }
    }
}

impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the files directory. Args: command, timeout (optional seconds)."
    }

    fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let command = required_str(args, "command")?;
        let timeout_secs = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.timeout_secs)
            .clamp(1, MAX_TIMEOUT_SECS);
        let timeout = Duration::from_secs(timeout_secs);
        let cwd = sandbox_root(&self.root)?;

        let mut cmd = shell_command(&command);
        cmd.current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::Execution(format!("failed to spawn command: {e}")))?;

        // Drain pipes on their own threads so a chatty child cannot block on a full pipe.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ToolError::Execution(format!(
                            "command timed out after {timeout_secs}s"
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    return Err(ToolError::Execution(format!(
                        "failed to check command status: {e}"
                    )));
                }
            }
        };

        let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
        let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
        let output = if stderr.is_empty() {
            stdout
        } else if stdout.is_empty() {
            stderr
        } else {
            format!("{stdout}\n--- stderr ---\n{stderr}")
        };
        let (output, _) = truncate_output(output.trim_end(), self.max_bytes);

        if status.success() {
            if output.is_empty() {
                Ok("Command completed with no output.".to_owned())
            } else {
                Ok(output)
            }
        } else {
            let exit_code = status.code().unwrap_or(-1);
            Err(ToolError::Execution(format!(
                "command exited with code {exit_code}: {output}"
            )))
        }
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(all(test, unix))]
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
    fn runs_in_files_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("marker.txt"), "x").expect("seed");
        let tool = RunCommandTool::new(dir.path().to_path_buf());

        let out = tool.execute(&args(json!({"command": "ls"}))).expect("ls");
        assert!(out.contains("marker.txt"), "{out}");
    }

    #[test]
    fn merges_stderr_and_reports_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = RunCommandTool::new(dir.path().to_path_buf());

        let err = tool
            .execute(&args(json!({"command": "echo out; echo err 1>&2; exit 3"})))
            .expect_err("non-zero exit");
        let msg = err.to_string();
        assert!(msg.contains("code 3"), "{msg}");
        assert!(msg.contains("out") && msg.contains("err"), "{msg}");
    }

    #[test]
    fn times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = RunCommandTool::with_config(dir.path().to_path_buf(), 1024, 1);

        let start = Instant::now();
        let err = tool
            .execute(&args(json!({"command": "sleep 5"})))
            .expect_err("timeout");
        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_command_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = RunCommandTool::new(dir.path().to_path_buf());
        assert!(matches!(
            tool.execute(&ToolArgs::new()),
            Err(ToolError::InvalidArgs(_))
        ));
    }
}
