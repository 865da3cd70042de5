//! arpeggio client - command-line interface
//!
//! Loads the persisted navigation session, runs one subcommand against the
//! current tree position, and saves the session back unless an aborted
//! navigation discarded it.

use std::process::ExitCode;

use arpeggio_utils::{init_logging_with_config, paths, LogConfig, Result};

mod cli;
mod commands;
mod config;
mod session;

use cli::{Args, Command};
use session::Session;

#[tokio::main]
async fn main() -> ExitCode {
    // Logging goes to a file; stdout belongs to command output
    if let Err(e) = init_logging_with_config(LogConfig::client()) {
        eprintln!("warning: {}", e);
    }

    let args = Args::parse_args();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let session_path = args.session.unwrap_or_else(paths::session_file);
    let mut session = Session::load(session_path, &config::default_uri());

    // Ephemeral navigation: applies to this invocation, never persisted
    if let Some(path) = &args.select {
        session.discard();
        session.select(path).await?;
    }

    let result = match args.command {
        Command::Keywords => commands::keywords(&session).await,
        Command::Exec { name, args } => commands::exec(&session, &name, args).await,
        Command::Services => commands::services(&session).await,
        Command::Select { path, timeout } => {
            let result = commands::select(&mut session, &path, timeout).await;
            if result.is_err() {
                // Never persist a half-finished path change
                session.discard();
            }
            result
        }
        Command::Run { name, args } => commands::run(&session, &name, args).await,
    };

    let saved = session.save();
    result.and(saved)
}
