//! Centralized application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/atlas/` | `~/.local/share/atlas/` |
//! | Config | `~/Library/Application Support/atlas/` | `~/.config/atlas/` |
//!
//! # Environment Overrides
//!
//! - `ATLAS_DATA_DIR`: overrides [`data_dir`]
//! - `ATLAS_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the SQLite database, the sandboxed files directory and logs.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ATLAS_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("atlas"))
        .unwrap_or_else(|| PathBuf::from("/tmp/atlas-data"))
}

/// Application config directory (`config.toml`).
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ATLAS_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("atlas"))
        .unwrap_or_else(|| PathBuf::from("/tmp/atlas-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Default SQLite database path (`data_dir()/memory.db`).
#[must_use]
pub fn database_path() -> PathBuf {
    data_dir().join("memory.db")
}

/// Directory that file tools are sandboxed to (`~/ATLAS_FILES` by default).
#[must_use]
pub fn files_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join("ATLAS_FILES"))
        .unwrap_or_else(|| data_dir().join("files"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_live_under_data_dir() {
        let data = data_dir();
        assert!(logs_dir().starts_with(&data));
        assert!(database_path().starts_with(&data));
        assert!(database_path().ends_with("memory.db"));
    }

    #[test]
    fn config_dir_is_named_after_the_app() {
        if std::env::var_os("ATLAS_CONFIG_DIR").is_none() {
            assert!(config_dir().to_string_lossy().contains("atlas"));
        }
    }
}
