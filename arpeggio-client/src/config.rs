//! Client-side configuration loading
//!
//! Reads the optional config file for the default root address the session
//! resets to when no usable session file exists.

use std::path::PathBuf;

use crate::session::DEFAULT_URI;

/// Get the config file path (~/.config/arpeggio/config.toml)
fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("arpeggio")
        .join("config.toml")
}

/// Client configuration
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
struct ClientConfig {
    remote: RemoteConfig,
}

/// Root endpoint settings
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
struct RemoteConfig {
    /// Default root address for fresh sessions
    uri: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
        }
    }
}

/// Resolve the default root URI from the config file, falling back to the
/// built-in default when the file is missing or unparseable
pub fn default_uri() -> String {
    let path = config_file();

    if !path.exists() {
        return DEFAULT_URI.to_string();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_default_uri(&content),
        Err(e) => {
            tracing::warn!("Failed to read config file: {}, using defaults", e);
            DEFAULT_URI.to_string()
        }
    }
}

fn parse_default_uri(content: &str) -> String {
    match toml::from_str::<ClientConfig>(content) {
        Ok(config) => config.remote.uri,
        Err(e) => {
            tracing::warn!("Failed to parse config file: {}, using defaults", e);
            DEFAULT_URI.to_string()
        }
    }
}
