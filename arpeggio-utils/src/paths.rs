//! Path utilities for arpeggio
//!
//! Handles XDG Base Directory specification compliance for config,
//! state, and log directories.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application identifier for XDG directories
const APP_NAME: &str = "arpeggio";

/// Get project directories
fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/arpeggio` or `~/.config/arpeggio`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(fallback_config_dir)
}

/// Get the client configuration file path
///
/// Location: `$XDG_CONFIG_HOME/arpeggio/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the state directory (persistent state like the navigation session)
///
/// Location: `$XDG_STATE_HOME/arpeggio` or `~/.local/state/arpeggio`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the navigation session file path
///
/// Location: `$XDG_STATE_HOME/arpeggio/session.bin`
pub fn session_file() -> PathBuf {
    state_dir().join("session.bin")
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/arpeggio/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

// Fallback implementations when ProjectDirs is unavailable

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn fallback_config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_NAME)
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_under_config_dir() {
        assert!(config_file().starts_with(config_dir()));
        assert_eq!(config_file().file_name().unwrap(), "config.toml");
    }

    #[test]
    fn test_session_file_under_state_dir() {
        assert!(session_file().starts_with(state_dir()));
        assert_eq!(session_file().file_name().unwrap(), "session.bin");
    }

    #[test]
    fn test_log_dir_under_state_dir() {
        assert!(log_dir().starts_with(state_dir()));
    }

    #[test]
    fn test_ensure_dir_creates() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // Idempotent
        ensure_dir(&nested).unwrap();
    }
}
