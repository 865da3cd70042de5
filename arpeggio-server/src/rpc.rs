//! HTTP RPC surface for the controller daemon
//!
//! Serves the wire protocol on POST `/`: one JSON `RpcRequest` in, one
//! `RpcResponse` out. Keyword failures travel inside the report; only a
//! malformed request produces an error envelope.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use arpeggio_protocol::{KeywordReport, RpcCall, RpcRequest, RpcResponse};
use arpeggio_utils::{ArpeggioError, Result};

use crate::router::Router;

/// Shared server state
#[derive(Clone)]
pub struct SharedState {
    pub router: Arc<RwLock<Router>>,
    pub shutdown_tx: broadcast::Sender<()>,
}

/// Run the RPC accept loop until a shutdown signal arrives
pub async fn run_rpc_server(addr: String, state: SharedState) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ArpeggioError::connection(format!("Failed to bind {}: {}", addr, e)))?;

    info!("RPC server listening on http://{}", addr);

    let mut shutdown_rx = state.shutdown_tx.subscribe();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, remote_addr) = match accept_result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("RPC accept error: {}", e);
                        continue;
                    }
                };

                let io = TokioIo::new(stream);
                let state_clone = state.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = state_clone.clone();
                        async move { handle_request(req, state).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        // Connection errors are expected when clients disconnect
                        if !e.is_incomplete_message() {
                            warn!("RPC connection error from {}: {}", remote_addr, e);
                        }
                    }
                });
            }

            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping RPC server");
                break;
            }
        }
    }

    Ok(())
}

/// Handle an HTTP request
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: SharedState,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::POST, "/") => Ok(serve_rpc(req, state).await),
        (&Method::GET, "/health") => Ok(serve_health()),
        _ => Ok(not_found()),
    }
}

/// Decode one RPC request, execute it, encode the response
async fn serve_rpc(req: Request<hyper::body::Incoming>, state: SharedState) -> Response<Full<Bytes>> {
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("unreadable body: {}", e)),
    };

    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("malformed request: {}", e))
        }
    };

    debug!(id = %request.id, "rpc request");
    let response = execute_call(request.call, &state).await;
    json_response(StatusCode::OK, &response)
}

/// Execute one decoded call against the router
pub(crate) async fn execute_call(call: RpcCall, state: &SharedState) -> RpcResponse {
    match call {
        RpcCall::RunKeyword { name, args, kwargs } => {
            // Dispatch never throws past this point: the caller inspects
            // the report status
            let mut router = state.router.write().await;
            match router.dispatch(&name, args, kwargs).await {
                Ok(value) => RpcResponse::Report(KeywordReport::pass(value)),
                Err(e) => RpcResponse::Report(KeywordReport::fail(e.to_string())),
            }
        }
        RpcCall::GetKeywordNames => {
            RpcResponse::KeywordNames(state.router.read().await.keyword_names())
        }
        RpcCall::GetKeywordArguments { name } => {
            match state.router.read().await.keyword_arguments(&name) {
                Ok(arguments) => RpcResponse::KeywordArguments(arguments),
                Err(e) => RpcResponse::Error {
                    message: e.to_string(),
                },
            }
        }
        RpcCall::GetServices => RpcResponse::Services(state.router.read().await.services()),
        RpcCall::StopRemoteServer => {
            info!("remote shutdown requested");
            let _ = state.shutdown_tx.send(());
            RpcResponse::Stopping
        }
        RpcCall::Ping => RpcResponse::Pong,
    }
}

fn json_response(status: StatusCode, response: &RpcResponse) -> Response<Full<Bytes>> {
    match serde_json::to_vec(response) {
        Ok(body) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("encoding failure: {}", e),
        ),
    }
}

fn error_response(status: StatusCode, message: String) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(&RpcResponse::Error { message }).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn serve_health() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("OK")))
        .unwrap()
}

fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::from("Not Found")))
        .unwrap()
}
