//! Speech through a system TTS command (`say`, `espeak-ng`, `espeak`).
//!
//! One process per utterance; cancellation kills it.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SpeechSynthesizer;
use crate::config::TtsConfig;
use crate::error::{AssistantError, Result};

/// Programs tried, in order, when no command is configured.
const CANDIDATES: &[&str] = &["say", "espeak-ng", "espeak"];

/// How often a running utterance checks for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Synthesizer spawning a TTS program per utterance.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: PathBuf,
    rate_wpm: u32,
}

impl CommandSynthesizer {
    /// Resolve the configured command, or the first candidate on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Tts`] when no program is available.
    pub fn detect(config: &TtsConfig) -> Result<Self> {
        let program = match &config.command {
            Some(command) => which::which(command)
                .map_err(|e| AssistantError::Tts(format!("TTS command '{command}': {e}")))?,
            None => CANDIDATES
                .iter()
                .find_map(|name| which::which(name).ok())
                .ok_or_else(|| {
                    AssistantError::Tts(format!(
                        "no TTS program found (tried {})",
                        CANDIDATES.join(", ")
                    ))
                })?,
        };
        info!("speech output via {}", program.display());
        Ok(Self {
            program,
            rate_wpm: config.rate_wpm,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, text: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        let rate = self.rate_wpm.to_string();
        if is_say(&self.program) {
            cmd.args(["-r", &rate]);
        } else {
            cmd.args(["-s", &rate]);
        }
        cmd.arg(text.trim_start_matches('-'));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

fn is_say(program: &Path) -> bool {
    program
        .file_stem()
        .is_some_and(|stem| stem.eq_ignore_ascii_case("say"))
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let child = self
            .command(text)
            .spawn()
            .map_err(|e| AssistantError::Tts(format!("cannot start TTS program: {e}")))?;
        wait_or_kill(child, cancel)
    }
}

fn wait_or_kill(mut child: Child, cancel: &CancellationToken) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            debug!("utterance cancelled");
            return Ok(());
        }
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => {
                return Err(AssistantError::Tts(format!("TTS program exited with {status}")));
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(AssistantError::Tts(format!("cannot wait for TTS program: {e}"))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::time::Instant;

    #[test]
    fn say_uses_rate_flag() {
        assert!(is_say(Path::new("/usr/bin/say")));
        assert!(!is_say(Path::new("/usr/bin/espeak-ng")));
    }

    #[test]
    fn missing_configured_command_is_an_error() {
        let config = TtsConfig {
            command: Some("definitely-not-a-tts-program-xyz".to_owned()),
            ..TtsConfig::default()
        };
        assert!(CommandSynthesizer::detect(&config).is_err());
    }

    #[test]
    fn cancellation_kills_the_process() {
        let child = Command::new("sleep").arg("5").spawn().expect("spawn sleep");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let started = Instant::now();
        wait_or_kill(child, &cancel).expect("cancelled cleanly");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
