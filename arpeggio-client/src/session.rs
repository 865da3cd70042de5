//! Persisted navigable session over the service tree
//!
//! The session is a non-empty stack of hops; the bottom entry is the
//! permanent root. It is loaded at startup, saved at teardown unless
//! explicitly discarded, and a missing or corrupt file resets it to a
//! single root hop at the configured default address.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use arpeggio_protocol::RpcClient;
use arpeggio_utils::{paths, ArpeggioError, Result};

/// Default root address when no configuration overrides it
pub const DEFAULT_URI: &str = "http://127.0.0.1:20000";

/// Name given to the permanent root hop
const ROOT_HOP: &str = "root";

/// Interval between readiness probes
const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// One position in the service tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub name: String,
    pub uri: String,
}

/// On-disk session state (opaque bincode blob)
#[derive(Debug, Serialize, Deserialize)]
struct SessionState {
    stack: Vec<Hop>,
}

/// A persisted navigation stack
pub struct Session {
    path: PathBuf,
    stack: Vec<Hop>,
    discard: bool,
}

impl Session {
    /// Load the session from disk, resetting to the default root when the
    /// file is missing or corrupt
    pub fn load(path: PathBuf, default_uri: &str) -> Self {
        let stack = Self::read_stack(&path).unwrap_or_else(|| {
            debug!(path = %path.display(), "no usable session, starting at the root");
            vec![Hop {
                name: ROOT_HOP.to_string(),
                uri: default_uri.to_string(),
            }]
        });

        Self {
            path,
            stack,
            discard: false,
        }
    }

    fn read_stack(path: &PathBuf) -> Option<Vec<Hop>> {
        let bytes = std::fs::read(path).ok()?;
        let state: SessionState = bincode::deserialize(&bytes).ok()?;
        // The stack is never empty; treat a violating file as corrupt
        if state.stack.is_empty() {
            return None;
        }
        Some(state.stack)
    }

    /// Persist the stack unless a discard was requested
    pub fn save(&self) -> Result<()> {
        if self.discard {
            return Ok(());
        }

        let bytes = bincode::serialize(&SessionState {
            stack: self.stack.clone(),
        })
        .map_err(|e| ArpeggioError::internal(format!("Failed to encode session: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            paths::ensure_dir(&parent.to_path_buf()).map_err(|e| ArpeggioError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, bytes).map_err(|e| ArpeggioError::FileWrite {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Abandon in-progress navigation; the next save becomes a no-op
    pub fn discard(&mut self) {
        self.discard = true;
    }

    /// The current position (top of stack)
    pub fn current(&self) -> &Hop {
        self.stack.last().expect("stack is never empty")
    }

    /// Stack depth, root included
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// All hops, root first
    pub fn hops(&self) -> &[Hop] {
        &self.stack
    }

    /// Descend into a named child
    pub fn push(&mut self, name: String, uri: String) {
        self.stack.push(Hop { name, uri });
    }

    /// Ascend one hop; the root entry is permanent
    pub fn pop(&mut self) -> Result<()> {
        if self.stack.len() > 1 {
            self.stack.pop();
            Ok(())
        } else {
            Err(ArpeggioError::InvalidPath(
                "cannot ascend past the root".into(),
            ))
        }
    }

    /// Return to the root
    pub fn root(&mut self) {
        self.stack.truncate(1);
    }

    /// Bind an RPC client to the current position
    pub fn connect(&self) -> Result<RpcClient> {
        RpcClient::new(&self.current().uri)
    }

    /// Walk a filesystem-like path, one segment at a time
    ///
    /// Empty segments reset to the root, `..` ascends, `.` is a no-op, and
    /// any other name descends by asking the current node for the child's
    /// address via the routed `get_services` call.
    pub async fn select(&mut self, path: &str) -> Result<()> {
        for segment in normalize(path) {
            match segment {
                Segment::Root => self.root(),
                Segment::Up => self.pop()?,
                Segment::Name(name) => {
                    let value = self
                        .connect()?
                        .run("get_services", Vec::new(), Default::default())
                        .await?
                        .unwrap_or_default();
                    let uri = value
                        .get(&name)
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| ArpeggioError::UnknownService(name.clone()))?
                        .to_string();
                    self.push(name, uri);
                }
            }
        }
        Ok(())
    }

    /// Probe the current position until it answers, retrying once per
    /// second; the final attempt after the timeout propagates its failure
    pub async fn check(&self, timeout: u64) -> Result<&Hop> {
        let client = self.connect()?;
        let deadline = Instant::now() + Duration::from_secs(timeout);

        while Instant::now() < deadline {
            if client.get_keyword_names().await.is_ok() {
                return Ok(self.current());
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }

        client.get_keyword_names().await?;
        Ok(self.current())
    }
}

/// One parsed path segment
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Root,
    Up,
    Name(String),
}

/// Lexically normalize a path: `.` drops, a name followed by `..` cancels,
/// an empty segment (leading or doubled slash) resets to the root
fn normalize(path: &str) -> Vec<Segment> {
    if path.is_empty() {
        return Vec::new();
    }

    let parts: Vec<&str> = path.split('/').collect();
    let mut out: Vec<Segment> = Vec::new();

    for (index, part) in parts.iter().enumerate() {
        match *part {
            // Trailing slash produces a final empty segment; ignore it
            "" if index == parts.len() - 1 && index > 0 => {}
            "" => {
                out.clear();
                out.push(Segment::Root);
            }
            "." => {}
            ".." => match out.last() {
                Some(Segment::Name(_)) => {
                    out.pop();
                }
                _ => out.push(Segment::Up),
            },
            name => out.push(Segment::Name(name.to_string())),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fresh(dir: &tempfile::TempDir) -> Session {
        Session::load(dir.path().join("session.bin"), DEFAULT_URI)
    }

    #[test]
    fn test_load_missing_resets_to_root() {
        let dir = tempdir().unwrap();
        let session = fresh(&dir);
        assert_eq!(session.depth(), 1);
        assert_eq!(session.current().name, "root");
        assert_eq!(session.current().uri, DEFAULT_URI);
    }

    #[test]
    fn test_load_corrupt_resets_to_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.bin");
        std::fs::write(&path, b"definitely not bincode").unwrap();

        let session = Session::load(path, DEFAULT_URI);
        assert_eq!(session.depth(), 1);
        assert_eq!(session.current().uri, DEFAULT_URI);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let mut session = fresh(&dir);
        session.push("alice".into(), "http://127.0.0.1:9000".into());
        session.push("deep".into(), "http://127.0.0.1:9001".into());
        session.save().unwrap();

        let reloaded = fresh(&dir);
        assert_eq!(reloaded.hops(), session.hops());
        assert_eq!(reloaded.current().name, "deep");
    }

    #[test]
    fn test_discard_suppresses_save() {
        let dir = tempdir().unwrap();
        let mut session = fresh(&dir);
        session.push("alice".into(), "http://127.0.0.1:9000".into());
        session.discard();
        session.save().unwrap();

        let reloaded = fresh(&dir);
        assert_eq!(reloaded.depth(), 1);
    }

    #[test]
    fn test_pop_at_root_fails() {
        let dir = tempdir().unwrap();
        let mut session = fresh(&dir);
        let err = session.pop().unwrap_err();
        assert!(matches!(err, ArpeggioError::InvalidPath(_)));
        // The stack never shrinks below the root
        assert_eq!(session.depth(), 1);
    }

    #[test]
    fn test_push_pop_root() {
        let dir = tempdir().unwrap();
        let mut session = fresh(&dir);
        session.push("a".into(), "http://a".into());
        session.push("b".into(), "http://b".into());
        assert_eq!(session.depth(), 3);

        session.pop().unwrap();
        assert_eq!(session.current().name, "a");

        session.push("c".into(), "http://c".into());
        session.root();
        assert_eq!(session.depth(), 1);
        assert_eq!(session.current().name, "root");
    }

    #[test]
    fn test_normalize_plain() {
        assert_eq!(
            normalize("a/b"),
            vec![Segment::Name("a".into()), Segment::Name("b".into())]
        );
    }

    #[test]
    fn test_normalize_ascend_cancels_descend() {
        // "a/../b" is equivalent to "b": the cancelled hop is never visited
        assert_eq!(normalize("a/../b"), vec![Segment::Name("b".into())]);
    }

    #[test]
    fn test_normalize_leading_slash_is_root() {
        assert_eq!(
            normalize("/a"),
            vec![Segment::Root, Segment::Name("a".into())]
        );
        assert_eq!(normalize("/"), vec![Segment::Root]);
    }

    #[test]
    fn test_normalize_doubled_slash_is_root() {
        assert_eq!(
            normalize("a//b"),
            vec![Segment::Root, Segment::Name("b".into())]
        );
    }

    #[test]
    fn test_normalize_dot_is_noop() {
        assert_eq!(normalize("."), Vec::new());
        assert_eq!(normalize("./a/."), vec![Segment::Name("a".into())]);
    }

    #[test]
    fn test_normalize_bare_up_survives() {
        // An ascent with nothing to cancel must reach the stack and fail there
        assert_eq!(normalize(".."), vec![Segment::Up]);
        assert_eq!(normalize("../a"), vec![Segment::Up, Segment::Name("a".into())]);
    }

    #[test]
    fn test_normalize_trailing_slash() {
        assert_eq!(normalize("a/"), vec![Segment::Name("a".into())]);
    }

    #[tokio::test]
    async fn test_select_up_at_root_fails() {
        let dir = tempdir().unwrap();
        let mut session = fresh(&dir);
        let err = session.select("..").await.unwrap_err();
        assert!(matches!(err, ArpeggioError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_select_cancelled_descend_needs_no_network() {
        // "a/.." never contacts a server even though nothing is listening
        let dir = tempdir().unwrap();
        let mut session = fresh(&dir);
        session.select("a/..").await.unwrap();
        assert_eq!(session.depth(), 1);
    }

    mod remote {
        use super::*;
        use arpeggio_protocol::{KeywordReport, RpcResponse};
        use serde_json::json;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        /// Serve the same canned response to every connection
        async fn mock_endpoint(response: RpcResponse) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let uri = format!("http://{}", listener.local_addr().unwrap());
            tokio::spawn(serve_forever(listener, response));
            uri
        }

        async fn serve_forever(listener: TcpListener, response: RpcResponse) {
            let body = serde_json::to_string(&response).unwrap();
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                // Drain the request head and body before replying
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        }

        #[tokio::test]
        async fn test_select_descends_via_get_services() {
            let child = mock_endpoint(RpcResponse::KeywordNames(Vec::new())).await;
            let root = mock_endpoint(RpcResponse::Report(KeywordReport::pass(Some(
                json!({ "alice": child.clone() }),
            ))))
            .await;

            let dir = tempdir().unwrap();
            let mut session = Session::load(dir.path().join("session.bin"), &root);
            session.select("alice").await.unwrap();

            assert_eq!(session.depth(), 2);
            assert_eq!(session.current().name, "alice");
            assert_eq!(session.current().uri, child);
        }

        #[tokio::test]
        async fn test_select_unknown_child() {
            let root = mock_endpoint(RpcResponse::Report(KeywordReport::pass(Some(json!({})))))
                .await;

            let dir = tempdir().unwrap();
            let mut session = Session::load(dir.path().join("session.bin"), &root);
            let err = session.select("ghost").await.unwrap_err();
            assert!(matches!(err, ArpeggioError::UnknownService(name) if name == "ghost"));
        }

        #[tokio::test]
        async fn test_check_succeeds_immediately() {
            let root = mock_endpoint(RpcResponse::KeywordNames(vec!["proxy".into()])).await;

            let dir = tempdir().unwrap();
            let session = Session::load(dir.path().join("session.bin"), &root);
            let hop = session.check(0).await.unwrap();
            assert_eq!(hop.name, "root");
        }

        #[tokio::test]
        async fn test_check_final_attempt_propagates() {
            // Reserve a dead port
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let uri = format!("http://{}", listener.local_addr().unwrap());
            drop(listener);

            let dir = tempdir().unwrap();
            let session = Session::load(dir.path().join("session.bin"), &uri);

            let started = std::time::Instant::now();
            let err = session.check(1).await.unwrap_err();
            assert!(err.is_retryable());
            // One probe, one sleep, one final attempt
            assert!(started.elapsed() >= Duration::from_secs(1));
        }

        #[tokio::test]
        async fn test_check_succeeds_once_endpoint_appears() {
            // Reserve a port, bring the endpoint up after ~2s
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let uri = format!("http://{}", addr);
            drop(listener);

            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1800)).await;
                let listener = TcpListener::bind(addr).await.unwrap();
                serve_forever(listener, RpcResponse::KeywordNames(Vec::new())).await;
            });

            let dir = tempdir().unwrap();
            let session = Session::load(dir.path().join("session.bin"), &uri);
            session.check(5).await.unwrap();
        }
    }
}
