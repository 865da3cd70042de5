//! Test-only helpers: a canned-response HTTP endpoint standing in for a
//! remote worker

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use arpeggio_protocol::{RpcRequest, RpcResponse};

/// Serve each canned response to one connection in turn, capturing the
/// decoded request bodies. Returns the bound port and the capture channel.
pub async fn mock_worker(
    responses: Vec<RpcResponse>,
) -> (u16, mpsc::UnboundedReceiver<RpcRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for response in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_http_request(&mut stream).await;
            let _ = seen_tx.send(request);

            let body = serde_json::to_string(&response).unwrap();
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
    });

    (port, seen_rx)
}

async fn read_http_request(stream: &mut TcpStream) -> RpcRequest {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        raw.extend_from_slice(&buf[..n]);
        if let Some(split) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&raw[..split]).to_lowercase();
            let length: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            let body_start = split + 4;
            while raw.len() < body_start + length {
                let n = stream.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
            }
            return serde_json::from_slice(&raw[body_start..body_start + length]).unwrap();
        }
    }
}
