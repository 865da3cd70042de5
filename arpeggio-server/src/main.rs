//! arpeggio server - controller daemon
//!
//! Loads the YAML configuration, spawns the configured worker processes,
//! and answers the keyword RPC surface until told to stop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};

use arpeggio_utils::{init_logging_with_config, LogConfig, LogOutput, Result};

mod config;
mod extension;
mod router;
mod rpc;
mod sequence;
mod template;
#[cfg(test)]
mod testutil;
mod worker;

use config::ConfigLoader;
use router::Router;
use rpc::SharedState;

/// arpeggio-server - routed keyword RPC daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Listen port
    #[arg(long, default_value_t = 20000)]
    port: u16,

    /// Configuration file
    #[arg(long, default_value = "configuration.yml")]
    conf: PathBuf,

    /// Log file name under the state log directory (stderr when omitted)
    #[arg(long, env = "ARPEGGIO_SERVER_LOG_FILE")]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_config = match &args.log {
        Some(name) => LogConfig {
            output: LogOutput::File,
            file_name: Some(name.clone()),
            ..LogConfig::server()
        },
        None => LogConfig::server(),
    };
    init_logging_with_config(log_config)?;

    run_daemon(args).await
}

/// Run the daemon until ctrl-c or a remote stop request
async fn run_daemon(args: Args) -> Result<()> {
    info!("arpeggio server starting");

    let config = ConfigLoader::load_and_validate(&args.conf)?;
    let router = Router::new(&config, Vec::new())?;
    let router = Arc::new(RwLock::new(router));

    let (shutdown_tx, _) = broadcast::channel(1);

    // ctrl-c triggers the same shutdown path as StopRemoteServer
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                let _ = shutdown_tx.send(());
            }
        });
    }

    let state = SharedState {
        router: Arc::clone(&router),
        shutdown_tx,
    };

    let addr = format!("{}:{}", args.host, args.port);
    let result = rpc::run_rpc_server(addr, state).await;

    if let Err(e) = &result {
        error!("RPC server error: {}", e);
    }

    // Workers die exactly once, on every exit path
    router.write().await.shutdown().await;

    info!("arpeggio server stopped");
    result
}
