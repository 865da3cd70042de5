//! Configuration schema structs
//!
//! Mirrors the YAML document handed to the daemon: a context map, the
//! worker services to spawn, extension settings, and declared sequences.
//! Sequence mappings stay as `serde_yaml::Mapping` so declaration order
//! survives until they are compiled into specs.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Context overrides applied on top of the environment snapshot
    pub context: BTreeMap<String, String>,
    /// Worker processes to spawn, keyed by service name
    pub services: BTreeMap<String, WorkerSpec>,
    /// Extension settings, keyed by extension name
    pub extensions: BTreeMap<String, BTreeMap<String, String>>,
    /// Declared sequences, keyed by sequence name
    pub sequences: BTreeMap<String, SequenceConfig>,
}

/// Launch description for one worker process
///
/// Immutable after load; `cmd` is whitespace-split into an argv prefix and
/// extended with `--host`, `--port`, and one `--key=value` per setting.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSpec {
    pub cmd: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// Declared sequence: context defaults plus ordered steps
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Context defaults; declaration order defines positional override slots
    pub context: serde_yaml::Mapping,
    /// Ordered steps: command path -> argument spec
    pub sequence: serde_yaml::Mapping,
}
