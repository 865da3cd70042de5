//! HTTP client binding for the arpeggio RPC protocol
//!
//! One `RpcClient` is bound to one endpoint URI. Binding never touches the
//! network; readiness is only discovered at call time.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use arpeggio_utils::{ArpeggioError, Result};

use crate::messages::{KeywordReport, Kwargs, RpcCall, RpcRequest, RpcResponse};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for one remote RPC endpoint
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    uri: String,
}

impl RpcClient {
    /// Bind a client to an endpoint URI (e.g. `http://127.0.0.1:20000`)
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ArpeggioError::connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            uri: uri.into(),
        })
    }

    /// The bound URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Send one call and decode the response envelope
    async fn call(&self, call: RpcCall) -> Result<RpcResponse> {
        let request = RpcRequest::new(call);
        tracing::debug!(id = %request.id, uri = %self.uri, "rpc call");

        let response = self
            .http
            .post(&self.uri)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ArpeggioError::ServiceUnreachable {
                        uri: self.uri.clone(),
                    }
                } else {
                    ArpeggioError::Connection(e.to_string())
                }
            })?;

        let response: RpcResponse = response.json().await.map_err(|e| {
            ArpeggioError::protocol(format!("Invalid response from {}: {}", self.uri, e))
        })?;

        match response {
            RpcResponse::Error { message } => Err(ArpeggioError::Protocol(message)),
            other => Ok(other),
        }
    }

    /// Execute one keyword and return its raw report
    ///
    /// Remote keyword failures come back inside the report; only transport
    /// problems surface as errors.
    pub async fn run_keyword(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<KeywordReport> {
        match self
            .call(RpcCall::RunKeyword {
                name: name.to_string(),
                args,
                kwargs,
            })
            .await?
        {
            RpcResponse::Report(report) => Ok(report),
            other => Err(unexpected("report", &other)),
        }
    }

    /// Execute one keyword, surfacing a FAIL report as an error
    pub async fn run(&self, name: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<Option<Value>> {
        self.run_keyword(name, args, kwargs).await?.into_result()
    }

    /// List keyword names available at the endpoint
    pub async fn get_keyword_names(&self) -> Result<Vec<String>> {
        match self.call(RpcCall::GetKeywordNames).await? {
            RpcResponse::KeywordNames(names) => Ok(names),
            other => Err(unexpected("keyword names", &other)),
        }
    }

    /// List the declared argument names of one keyword
    pub async fn get_keyword_arguments(&self, name: &str) -> Result<Vec<String>> {
        match self
            .call(RpcCall::GetKeywordArguments {
                name: name.to_string(),
            })
            .await?
        {
            RpcResponse::KeywordArguments(arguments) => Ok(arguments),
            other => Err(unexpected("keyword arguments", &other)),
        }
    }

    /// List the endpoint's child services
    pub async fn get_services(&self) -> Result<BTreeMap<String, String>> {
        match self.call(RpcCall::GetServices).await? {
            RpcResponse::Services(services) => Ok(services),
            other => Err(unexpected("services", &other)),
        }
    }

    /// Request a graceful remote shutdown
    pub async fn stop_remote_server(&self) -> Result<()> {
        match self.call(RpcCall::StopRemoteServer).await? {
            RpcResponse::Stopping => Ok(()),
            other => Err(unexpected("stopping", &other)),
        }
    }

    /// Liveness probe
    pub async fn ping(&self) -> Result<()> {
        match self.call(RpcCall::Ping).await? {
            RpcResponse::Pong => Ok(()),
            other => Err(unexpected("pong", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &RpcResponse) -> ArpeggioError {
    ArpeggioError::protocol(format!("Expected {}, got {:?}", wanted, got))
}
