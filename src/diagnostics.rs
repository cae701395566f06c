//! Log setup for the `atlas` binary.
//!
//! Records go to stderr and to a daily rolling file `atlas.log.YYYY-MM-DD`
//! under [`crate::app_dirs::logs_dir`]. Conversation text itself is printed
//! with `println!` and never logged above `debug`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset. Keeps HTTP and audio backends quiet.
pub const DEFAULT_FILTER: &str = "atlas=info,ureq=warn,cpal=warn";

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "atlas.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Returns the file writer guard; keep it alive for the lifetime of the
/// process so buffered records are flushed. When the log directory cannot be
/// created only stderr logging is installed and `None` is returned.
pub fn init_tracing(logs_dir: &Path) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(stderr_layer)
            .try_init();
        tracing::warn!("file logging disabled ({}): {e}", logs_dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
