//! Worker process supervision
//!
//! A `WorkerHandle` owns exactly one spawned worker process and the RPC
//! connection to it. The process is spawned eagerly at router construction;
//! reachability is only probed when a call is made.

use std::time::Duration;

use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info};

use arpeggio_protocol::{KeywordReport, Kwargs, RpcClient};
use arpeggio_utils::{ArpeggioError, Result};

use crate::config::WorkerSpec;

/// Interval between reachability probes during a courtesy shutdown wait
const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Owns one worker process and the RPC connection to it
pub struct WorkerHandle {
    name: String,
    command: Vec<String>,
    uri: String,
    child: Child,
    client: RpcClient,
}

impl WorkerHandle {
    /// Spawn the worker process described by `spec` and bind its RPC client
    ///
    /// Returns as soon as the process is launched; callers must probe for
    /// readiness themselves.
    pub fn start(name: &str, spec: &WorkerSpec) -> Result<Self> {
        let command = build_command(spec);
        if command.is_empty() {
            return Err(ArpeggioError::config(format!(
                "service {}: empty command line",
                name
            )));
        }

        let uri = format!("http://{}:{}", spec.host, spec.port);
        let child = Command::new(&command[0])
            .args(&command[1..])
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ArpeggioError::ProcessSpawn(format!("{}: {}", command[0], e)))?;
        let client = RpcClient::new(&uri)?;

        info!(name = %name, uri = %uri, "worker started");

        Ok(Self {
            name: name.to_string(),
            command,
            uri,
            client,
            child,
        })
    }

    /// The bound URI of this worker
    pub fn address(&self) -> &str {
        &self.uri
    }

    /// The launch command the process was spawned with
    pub fn launch_command(&self) -> &[String] {
        &self.command
    }

    /// Execute one keyword on the worker
    ///
    /// Remote keyword failures come back inside the report; only a
    /// connection-level problem is an error.
    pub async fn execute(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<KeywordReport> {
        self.client.run_keyword(name, args, kwargs).await
    }

    /// Ask the worker to shut down gracefully, then wait (best effort) for
    /// it to go away
    ///
    /// Polls reachability once per second until `timeout` lapses. Returns
    /// normally either way; a worker that refuses to die is the caller's
    /// problem, not a dispatch failure.
    pub async fn restart(&self, timeout: Duration) {
        let _ = self.client.stop_remote_server().await;

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.client.ping().await.is_err() {
                debug!(name = %self.name, "worker went away");
                return;
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
        debug!(name = %self.name, "worker still reachable after shutdown wait");
    }

    /// Terminate the owned process. Idempotent.
    pub async fn stop(&mut self) {
        match self.child.kill().await {
            Ok(()) => info!(name = %self.name, "worker stopped"),
            Err(e) => debug!(name = %self.name, error = %e, "worker already gone"),
        }
    }
}

/// Build the launch argv: executable + `--host` + `--port` + one
/// `--key=value` per setting
fn build_command(spec: &WorkerSpec) -> Vec<String> {
    let mut command: Vec<String> = spec.cmd.split_whitespace().map(String::from).collect();
    if command.is_empty() {
        return command;
    }
    command.push(format!("--host={}", spec.host));
    command.push(format!("--port={}", spec.port));
    for (key, value) in &spec.settings {
        command.push(format!("--{}={}", key, value));
    }
    command
}
