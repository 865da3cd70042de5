//! arpeggio-protocol: Shared RPC definitions for controller-worker communication
//!
//! This crate defines the message types exchanged over the HTTP RPC surface,
//! the dotted routing-path helpers, and the client binding used by both the
//! CLI and the server's worker handles.

pub mod client;
pub mod messages;
pub mod routing;

// Re-export main types at crate root
pub use client::RpcClient;
pub use messages::{
    KeywordReport, KeywordStatus, Kwargs, RpcCall, RpcRequest, RpcResponse, PROXY_KEYWORD,
};
pub use routing::split_head;

/// Current protocol version
pub const PROTOCOL_VERSION: u32 = 1;
