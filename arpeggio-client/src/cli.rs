//! Command-line argument parsing for the arpeggio client
//!
//! Uses clap for argument parsing with derive macros. Each subcommand maps
//! onto one operation of the remote keyword surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// arpeggio - routed keyword RPC client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Session file holding the navigation stack
    #[arg(long, short = 's', env = "ARPEGGIO_SESSION")]
    pub session: Option<PathBuf>,

    /// Navigate to this path for the current invocation only (never saved)
    #[arg(long)]
    pub select: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List keywords available at the current position
    Keywords,

    /// Execute one keyword; dotted names route through the worker tree
    Exec {
        /// Keyword name or dotted routing path
        name: String,
        /// Positional arguments forwarded to the keyword
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List child services of the current position
    Services,

    /// Navigate the service tree and probe readiness
    Select {
        /// Filesystem-like path: `..` ascends, a leading `/` returns to the root
        #[arg(default_value = ".")]
        path: String,

        /// Readiness probe timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Run a declared sequence with positional overrides
    Run {
        /// Sequence name
        name: String,
        /// Positional context overrides
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
