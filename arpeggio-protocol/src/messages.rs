//! RPC message types exchanged between clients, controllers, and workers

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use arpeggio_utils::{ArpeggioError, Result};

/// Keyword name reserved for one routing hop
///
/// A router receiving `proxy` with a path as first argument resolves the
/// path against its own children, so multi-hop addressing recurses without
/// any node knowing the whole tree.
pub const PROXY_KEYWORD: &str = "proxy";

/// Named arguments of a keyword call
pub type Kwargs = serde_json::Map<String, Value>;

/// Outcome of a remote keyword execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeywordStatus {
    #[serde(rename = "PASS")]
    Pass,
    /// A missing status field reads as a failure
    #[default]
    #[serde(rename = "FAIL")]
    Fail,
}

/// Result report for one keyword execution
///
/// Wire shape: `{status, return?, output?, error?}`. Remote-side failures
/// travel inside the report; the transport never turns them into HTTP errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordReport {
    #[serde(default)]
    pub status: KeywordStatus,
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeywordReport {
    /// Create a passing report with an optional return value
    pub fn pass(return_value: Option<Value>) -> Self {
        Self {
            status: KeywordStatus::Pass,
            return_value,
            output: None,
            error: None,
        }
    }

    /// Create a failing report carrying the error text
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            status: KeywordStatus::Fail,
            return_value: None,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Attach captured output
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == KeywordStatus::Pass
    }

    /// Convert into the keyword's return value, surfacing a FAIL as an error
    /// carrying the remote-reported text verbatim
    pub fn into_result(self) -> Result<Option<Value>> {
        match self.status {
            KeywordStatus::Pass => Ok(self.return_value),
            KeywordStatus::Fail => Err(ArpeggioError::Keyword(
                self.error.unwrap_or_else(|| "unknown".into()),
            )),
        }
    }
}

/// A single RPC call envelope
///
/// The id is generated per request and echoed in server logs for correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: Uuid,
    #[serde(flatten)]
    pub call: RpcCall,
}

impl RpcRequest {
    pub fn new(call: RpcCall) -> Self {
        Self {
            id: Uuid::new_v4(),
            call,
        }
    }
}

/// Calls understood by every arpeggio RPC endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum RpcCall {
    /// Execute one keyword; the name may be a dotted routing path
    RunKeyword {
        name: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        kwargs: Kwargs,
    },

    /// List keyword names available at this endpoint
    GetKeywordNames,

    /// List the declared argument names of one keyword
    GetKeywordArguments { name: String },

    /// List this endpoint's child services (name -> address)
    GetServices,

    /// Request a graceful shutdown
    StopRemoteServer,

    /// Liveness probe
    Ping,
}

/// Responses produced by an arpeggio RPC endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RpcResponse {
    Report(KeywordReport),
    KeywordNames(Vec<String>),
    KeywordArguments(Vec<String>),
    Services(BTreeMap<String, String>),
    Stopping,
    Pong,
    /// Transport-level failure (malformed request, unknown argument name)
    Error { message: String },
}
