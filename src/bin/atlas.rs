//! CLI binary for atlas.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use atlas::audio::{AudioSource, CpalMicrophone};
use atlas::config::AssistantConfig;
use atlas::dialogue::{DialogueOrchestrator, DialogueServices};
use atlas::llm::OllamaGenerator;
use atlas::memory::{FactStore, SqliteStore};
use atlas::pipeline::{AudioCoordinator, EventHub, Session, SessionMode, spawn_console_reader};
use atlas::scheduler::ReminderScheduler;
use atlas::stt::{Transcriber, WhisperServerStt};
use atlas::tools::{SystemLauncher, ToolContext, builtin_registry};
use atlas::tts::{CommandSynthesizer, SpeakMode, SpeechOutput};
use atlas::wakeword::TranscribingWakeRecognizer;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Atlas: voice and text personal assistant.
#[derive(Parser)]
#[command(name = "atlas", version, about)]
struct Cli {
    /// Text mode: type commands, press ENTER on an empty line to speak one.
    #[arg(long)]
    manual: bool,

    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = atlas::diagnostics::init_tracing(&atlas::app_dirs::logs_dir());

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let mode = if cli.manual {
        SessionMode::Manual
    } else {
        SessionMode::Wake
    };

    run(config, mode).await
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AssistantConfig> {
    if let Some(path) = path {
        return AssistantConfig::from_file(path)
            .with_context(|| format!("cannot load config {}", path.display()));
    }
    let default_path = AssistantConfig::default_config_path();
    if default_path.is_file() {
        info!("using config {}", default_path.display());
        return AssistantConfig::from_file(&default_path)
            .with_context(|| format!("cannot load config {}", default_path.display()));
    }
    Ok(AssistantConfig::default())
}

fn open_microphone(config: &AssistantConfig) -> Option<Arc<dyn AudioSource>> {
    match CpalMicrophone::list_input_devices() {
        Ok(devices) if !devices.is_empty() => {
            info!(devices = ?devices, "input devices");
            Some(Arc::new(CpalMicrophone::new(&config.audio)))
        }
        Ok(_) => {
            warn!("no input device found");
            None
        }
        Err(e) => {
            warn!("cannot enumerate input devices: {e}");
            None
        }
    }
}

async fn run(config: AssistantConfig, mode: SessionMode) -> anyhow::Result<()> {
    let name = config.assistant.name.clone();
    println!("\n{}", "=".repeat(50));
    println!("  {name} - AI Assistant");
    match mode {
        SessionMode::Wake => println!("  Voice mode"),
        SessionMode::Manual => println!("  Manual mode"),
    }
    println!("{}", "=".repeat(50));
    println!("Initializing...\n");

    // Generator first: nothing works without it.
    let generator = Arc::new(OllamaGenerator::new(&config.llm));
    let probe = {
        let generator = Arc::clone(&generator);
        tokio::task::spawn_blocking(move || generator.probe()).await?
    };
    if !probe.is_available() {
        println!("\n[!] Failed to connect to the language model at {}.", config.llm.api_url);
        anyhow::bail!("language model {}", probe);
    }

    let store = Arc::new(
        SqliteStore::open(&config.storage.database_path).with_context(|| {
            format!(
                "cannot open database {}",
                config.storage.database_path.display()
            )
        })?,
    );
    std::fs::create_dir_all(&config.storage.files_dir).with_context(|| {
        format!(
            "cannot create files directory {}",
            config.storage.files_dir.display()
        )
    })?;
    if let Ok(facts) = store.list_facts()
        && !facts.is_empty()
    {
        println!("[Memory] Loaded {} stored fact(s)", facts.len());
    }

    let registry = Arc::new(builtin_registry(&ToolContext {
        files_dir: config.storage.files_dir.clone(),
        facts: store.clone(),
        tasks: store.clone(),
        reminders: store.clone(),
        launcher: Arc::new(SystemLauncher),
    }));

    let synth = CommandSynthesizer::detect(&config.tts)?;
    let output = Arc::new(SpeechOutput::start(Arc::new(synth), &config.tts)?);

    let cancel = CancellationToken::new();
    let sink_output = Arc::clone(&output);
    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        Box::new(move |message| {
            println!("\n[Notification] {message}");
            sink_output.speak(message, SpeakMode::FireAndForget);
        }),
        &config.scheduler,
    ));
    let scheduler_task = Arc::clone(&scheduler).run(cancel.child_token());

    let hub = Arc::new(EventHub::new());
    let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperServerStt::new(&config.stt));
    let mut audio = open_microphone(&config).map(|source| {
        AudioCoordinator::new(
            source,
            Arc::clone(&transcriber),
            Arc::clone(&hub),
            config.capture.clone(),
        )
    });

    if mode == SessionMode::Wake {
        let Some(audio) = audio.as_mut() else {
            cancel.cancel();
            anyhow::bail!("voice mode needs a microphone; run with --manual");
        };
        audio.start_wake_listener(
            Box::new(TranscribingWakeRecognizer::new(
                &config.wake,
                Arc::clone(&transcriber),
            )),
            config.assistant.wake_phrases.clone(),
            &config.wake,
        )?;
    } else if audio.is_some() {
        println!("[Voice] Speech input ready");
    }

    let orchestrator = DialogueOrchestrator::new(
        DialogueServices {
            generator,
            registry,
            facts: store.clone(),
            conversation_log: Some(store.clone()),
            alerts: Some(Arc::clone(&scheduler)),
        },
        &config.assistant,
    );

    spawn_console_reader(Arc::clone(&hub))?;
    let session = Session::new(
        orchestrator,
        Arc::clone(&output),
        Arc::clone(&hub),
        audio,
        mode,
    );
    let mut session_task = tokio::task::spawn_blocking(move || session.run());

    let interrupted = tokio::select! {
        result = &mut session_task => {
            if let Err(e) = result? {
                warn!("session failed: {e}");
            }
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    cancel.cancel();
    hub.shutdown();
    if interrupted {
        info!("received Ctrl+C, shutting down...");
        output.stop();
        match session_task.await {
            Ok(Err(e)) => warn!("session failed: {e}"),
            Err(e) => warn!("session task failed: {e}"),
            Ok(Ok(())) => {}
        }
        println!("\n\n{name}: Goodbye.");
        output.speak("Goodbye.", SpeakMode::Wait);
    }

    if let Err(e) = scheduler_task.await {
        warn!("scheduler task failed: {e}");
    }
    info!("atlas shut down cleanly");
    Ok(())
}
