//! arpeggio-utils: Shared infrastructure for the arpeggio crates
//!
//! Provides the unified error type, logging setup, and XDG path helpers
//! used by the client, server, and protocol crates.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{ArpeggioError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};
pub use paths::{config_dir, config_file, ensure_dir, log_dir, session_file, state_dir};
