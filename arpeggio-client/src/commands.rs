//! Subcommand implementations
//!
//! Each command talks to the session's current position over RPC and
//! prints plain text to stdout; errors propagate to the caller, which
//! decides presentation and exit code.

use serde_json::Value;

use arpeggio_protocol::Kwargs;
use arpeggio_utils::{ArpeggioError, Result};

use crate::session::Session;

/// List keywords and their declared arguments
pub async fn keywords(session: &Session) -> Result<()> {
    let client = session.connect()?;

    println!("{:<30} {}", "COMMAND", "ARGUMENTS");
    for name in client.get_keyword_names().await? {
        let arguments = client.get_keyword_arguments(&name).await?;
        println!("{:<30} [{}]", name, arguments.join(" "));
    }
    Ok(())
}

/// Execute one keyword from the current position
pub async fn exec(session: &Session, name: &str, args: Vec<String>) -> Result<()> {
    let client = session.connect()?;
    let args = args.into_iter().map(Value::String).collect();

    let report = client.run_keyword(name, args, Kwargs::new()).await?;

    // Captured output goes to stderr when the keyword failed, so stdout
    // only ever carries successful results
    if let Some(output) = &report.output {
        if report.is_pass() {
            println!("{}", output);
        } else {
            eprintln!("{}", output);
        }
    }

    if let Some(value) = report.into_result()? {
        println!("{}", render(&value));
    }
    Ok(())
}

/// List child services of the current position
pub async fn services(session: &Session) -> Result<()> {
    let client = session.connect()?;

    println!("{:<30}{}", "SERVICES", "ADDRESS");
    for (name, uri) in client.get_services().await? {
        println!("{:<30}{}", name, uri);
    }
    Ok(())
}

/// Navigate the tree, then probe the new position for readiness
///
/// The caller discards the session on error so a half-finished path change
/// is never persisted.
pub async fn select(session: &mut Session, path: &str, timeout: u64) -> Result<()> {
    session.select(path).await?;
    let hop = session.check(timeout).await?;
    println!("{}: {}", hop.name, hop.uri);
    Ok(())
}

/// Run a declared sequence and print its per-step report
pub async fn run(session: &Session, name: &str, args: Vec<String>) -> Result<()> {
    let client = session.connect()?;
    let args = args.into_iter().map(Value::String).collect();

    let report = client.run_keyword(name, args, Kwargs::new()).await?;
    if let Some(output) = &report.output {
        if report.is_pass() {
            println!("{}", output);
        } else {
            eprintln!("{}", output);
        }
    }

    match report.into_result()? {
        Some(Value::Object(steps)) => {
            for (step, value) in steps {
                println!("{:<30} {}", step, render(&value));
            }
            Ok(())
        }
        Some(other) => {
            println!("{}", render(&other));
            Ok(())
        }
        None => Err(ArpeggioError::protocol(format!(
            "sequence {} produced no report",
            name
        ))),
    }
}

/// Render a return value: bare strings stay bare, everything else is
/// pretty-printed JSON
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
