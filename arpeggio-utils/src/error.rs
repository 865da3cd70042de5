//! Error types for arpeggio
//!
//! Provides a unified error type used across all arpeggio crates.

use std::path::PathBuf;

/// Main error type for arpeggio operations
#[derive(Debug, thiserror::Error)]
pub enum ArpeggioError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Service unreachable at {uri}")]
    ServiceUnreachable { uri: String },

    #[error("Connection timeout after {seconds}s")]
    ConnectionTimeout { seconds: u64 },

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Resolution Errors ===

    #[error("Unknown keyword: {0}")]
    UnknownKeyword(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Invalid service path: {0}")]
    InvalidPath(String),

    // === Execution Errors ===

    /// A well-formed FAIL report; carries the remote error text verbatim
    #[error("{0}")]
    Keyword(String),

    #[error("Missing context key: {0}")]
    MissingContextKey(String),

    #[error("Invalid template: {0}")]
    Template(String),

    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArpeggioError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is a connection-level failure worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ServiceUnreachable { .. } | Self::ConnectionTimeout { .. }
        )
    }
}

/// Result type alias using ArpeggioError
pub type Result<T> = std::result::Result<T, ArpeggioError>;
