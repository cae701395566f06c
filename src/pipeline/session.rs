//! Read-process-respond loops for wake mode and manual mode.
//!
//! Both modes consume [`SessionEvent`]s from the [`EventHub`] and share one
//! [`DialogueOrchestrator`]. Wake mode additionally owns the
//! [`AudioCoordinator`] for command capture and barge-in.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use super::coordinator::{AudioCoordinator, CaptureOutcome};
use super::events::EventHub;
use super::messages::SessionEvent;
use crate::dialogue::DialogueOrchestrator;
use crate::error::{AssistantError, Result};
use crate::tts::{SpeakMode, SpeechOutput};

/// Typed words that end the session in either mode.
pub const EXIT_WORDS: &[&str] = &["exit", "quit", "bye", "q"];

const MANUAL_GOODBYE: &str = "Goodbye, sir. Until next time.";
const CLOSING: &str = "Closing conversation.";

/// Whether `input` is an exit word.
pub fn is_exit_word(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_WORDS.contains(&input.as_str())
}

/// Which loop [`Session::run`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Voice activation plus console commands.
    Wake,
    /// Typed prompt; an empty line records one voice command.
    Manual,
}

/// Whether the wake loop continues after a conversation.
enum Flow {
    Continue,
    End,
}

/// Start a thread forwarding stdin lines to the hub.
///
/// The thread blocks on stdin and is left detached; end of input closes the
/// console on the hub.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_console_reader(hub: Arc<EventHub>) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("atlas-console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => hub.push_console(line.trim()),
                    Err(e) => {
                        warn!("console read failed: {e}");
                        break;
                    }
                }
                if hub.is_shutdown() {
                    return;
                }
            }
            debug!("console closed");
            hub.close_console();
        })
        .map_err(|e| AssistantError::Pipeline(format!("cannot spawn console reader: {e}")))
}

/// One interactive session.
pub struct Session {
    orchestrator: DialogueOrchestrator,
    output: Arc<SpeechOutput>,
    hub: Arc<EventHub>,
    audio: Option<AudioCoordinator>,
    mode: SessionMode,
}

impl Session {
    pub fn new(
        orchestrator: DialogueOrchestrator,
        output: Arc<SpeechOutput>,
        hub: Arc<EventHub>,
        audio: Option<AudioCoordinator>,
        mode: SessionMode,
    ) -> Self {
        Self {
            orchestrator,
            output,
            hub,
            audio,
            mode,
        }
    }

    /// Run until an exit word, the shutdown phrase, end of console input
    /// (manual mode) or hub shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Pipeline`] when wake mode has no
    /// microphone.
    pub fn run(mut self) -> Result<()> {
        let name = self.orchestrator.name().to_owned();
        info!(mode = ?self.mode, "session started");
        let result = match self.mode {
            SessionMode::Wake => self.run_wake(&name),
            SessionMode::Manual => self.run_manual(&name),
        };
        info!("session ended");
        result
    }

    fn run_wake(&mut self, name: &str) -> Result<()> {
        if self.audio.is_none() {
            return Err(AssistantError::Pipeline(
                "wake mode needs a microphone".into(),
            ));
        }
        println!("\n{name} ready. Say '{name}' to activate, or type a command ('exit' to quit).");
        self.output
            .speak(&format!("{name} is ready, sir."), SpeakMode::Wait);

        while let Some(event) = self.hub.wait_event() {
            match event {
                SessionEvent::Console(line) => {
                    if line.is_empty() {
                        continue;
                    }
                    if is_exit_word(&line) {
                        break;
                    }
                    let reply = self.respond(name, &line);
                    self.output.speak(&reply, SpeakMode::FireAndForget);
                    if self.orchestrator.is_terminated() {
                        break;
                    }
                }
                SessionEvent::Wake => {
                    println!("\n{name} activated!");
                    self.output.stop();
                    println!("{name}: Yes?");
                    self.output.speak("Yes?", SpeakMode::Wait);
                    if let Flow::End = self.conversation(name) {
                        break;
                    }
                }
                SessionEvent::ConsoleClosed => {
                    info!("console input closed; voice only from now on");
                }
            }
        }
        Ok(())
    }

    /// Follow-up turns after a wake, until a capture hears nothing.
    fn conversation(&mut self, name: &str) -> Flow {
        loop {
            if self.hub.is_shutdown() {
                return Flow::End;
            }

            let command = if let Some(line) = self.hub.take_console() {
                if line.is_empty() {
                    continue;
                }
                println!("   (Text input): \"{line}\"");
                if is_exit_word(&line) {
                    return Flow::End;
                }
                line
            } else {
                let Some(audio) = &self.audio else {
                    return Flow::Continue;
                };
                println!("Listening...");
                match audio.capture_command() {
                    Ok(CaptureOutcome::Heard(text)) => {
                        println!("   Heard: \"{text}\"");
                        text
                    }
                    Ok(CaptureOutcome::Interrupted) => continue,
                    Ok(CaptureOutcome::NoSpeech) => {
                        println!("   (Conversation timeout)");
                        self.output.speak(CLOSING, SpeakMode::Wait);
                        return Flow::Continue;
                    }
                    Err(e) => {
                        warn!("command capture failed: {e}");
                        self.output.speak(CLOSING, SpeakMode::Wait);
                        return Flow::Continue;
                    }
                }
            };

            let reply = self.respond(name, &command);
            if self.orchestrator.is_terminated() {
                self.output.speak(&reply, SpeakMode::Wait);
                return Flow::End;
            }
            let interrupted = self
                .audio
                .as_ref()
                .is_some_and(|audio| audio.speak_interruptible(&self.output, &reply));
            if interrupted {
                println!("\n[Interrupted]");
            }
        }
    }

    fn run_manual(&mut self, name: &str) -> Result<()> {
        println!("\n{name} ready. Type 'exit' to quit.");
        if self.audio.is_some() {
            println!("Press ENTER to use voice input.");
        }
        self.output
            .speak(&format!("{name} is ready, sir."), SpeakMode::Wait);

        loop {
            prompt(self.audio.is_some());
            let line = match self.hub.wait_event() {
                None | Some(SessionEvent::ConsoleClosed) => break,
                Some(SessionEvent::Wake) => continue,
                Some(SessionEvent::Console(line)) => line,
            };
            self.output.stop();

            let input = if line.is_empty() {
                match self.voice_input() {
                    Some(text) => text,
                    None => continue,
                }
            } else {
                line
            };

            if is_exit_word(&input) {
                println!("\n{name}: {MANUAL_GOODBYE}");
                self.output.speak(MANUAL_GOODBYE, SpeakMode::Wait);
                break;
            }

            let reply = self.respond(name, &input);
            self.output.speak(&reply, SpeakMode::Wait);
            if self.orchestrator.is_terminated() {
                break;
            }
        }
        Ok(())
    }

    /// One voice command for manual mode.
    fn voice_input(&self) -> Option<String> {
        let audio = self.audio.as_ref()?;
        println!("Listening...");
        match audio.capture_command() {
            Ok(CaptureOutcome::Heard(text)) => {
                println!("   Heard: \"{text}\"");
                Some(text)
            }
            Ok(_) => {
                println!("   (No speech detected)");
                None
            }
            Err(e) => {
                warn!("command capture failed: {e}");
                println!("   (No speech detected)");
                None
            }
        }
    }

    fn respond(&mut self, name: &str, input: &str) -> String {
        let reply = self.orchestrator.process(input);
        println!("\n{name}: {reply}");
        reply
    }
}

fn prompt(voice: bool) {
    if voice {
        print!("\nYou (type or ENTER for voice): ");
    } else {
        print!("\nYou: ");
    }
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_are_case_insensitive() {
        assert!(is_exit_word("EXIT"));
        assert!(is_exit_word(" q "));
        assert!(!is_exit_word("quit smoking"));
    }
}
