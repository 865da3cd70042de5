//! Dotted-path resolution and dispatch
//!
//! A router owns its direct children only. A path `a.b.leaf` is resolved
//! one hop at a time: `a` must name a worker, which receives a `proxy`
//! call carrying `b.leaf`; the remote router applies the same algorithm on
//! its own side, so the tree can be arbitrarily deep without any node
//! holding global topology knowledge.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{info, warn};

use arpeggio_protocol::{routing, Kwargs, PROXY_KEYWORD};
use arpeggio_utils::{ArpeggioError, Result};

use crate::config::AppConfig;
use crate::extension::Extension;
use crate::sequence::SequenceSpec;
use crate::worker::WorkerHandle;

/// Keywords every router answers locally
pub const BUILTIN_KEYWORDS: &[&str] = &[
    "get_services",
    "get_context",
    "add_context",
    "get_extensions",
    PROXY_KEYWORD,
];

/// A named collection of workers, extensions, and sequences
///
/// The worker and sequence sets are immutable after construction; only the
/// context is mutated over the router's lifetime, via explicit merges.
pub struct Router {
    workers: BTreeMap<String, WorkerHandle>,
    extensions: Vec<Box<dyn Extension>>,
    capabilities: BTreeMap<String, usize>,
    sequences: BTreeMap<String, SequenceSpec>,
    context: BTreeMap<String, String>,
}

impl Router {
    /// Build a router from configuration, spawning every declared worker
    ///
    /// The context starts as a one-time snapshot of the process environment
    /// and is overridden by the configured context. Extensions register
    /// only when the configuration carries a matching section.
    pub fn new(config: &AppConfig, extensions: Vec<Box<dyn Extension>>) -> Result<Self> {
        let mut context: BTreeMap<String, String> = std::env::vars().collect();
        context.extend(config.context.clone());

        let mut workers = BTreeMap::new();
        for (name, spec) in &config.services {
            workers.insert(name.clone(), WorkerHandle::start(name, spec)?);
        }

        let mut registered: Vec<Box<dyn Extension>> = Vec::new();
        let mut capabilities = BTreeMap::new();
        for mut extension in extensions {
            let Some(settings) = config.extensions.get(extension.name()) else {
                warn!(name = %extension.name(), "extension has no configuration section, skipped");
                continue;
            };
            extension.register(settings)?;
            let index = registered.len();
            for keyword in extension.keywords() {
                capabilities.insert(keyword, index);
            }
            registered.push(extension);
        }

        let mut sequences = BTreeMap::new();
        for (name, sequence) in &config.sequences {
            sequences.insert(name.clone(), SequenceSpec::from_config(name, sequence)?);
        }

        Ok(Self {
            workers,
            extensions: registered,
            capabilities,
            sequences,
            context,
        })
    }

    /// Resolve a dotted command path and execute it
    ///
    /// A single segment dispatches locally; `k` leading segments cross `k`
    /// worker boundaries, each as one `proxy` hop carrying the remaining
    /// path. A non-PASS report at any hop aborts the whole dispatch with
    /// the remote-reported error text.
    pub async fn dispatch(
        &mut self,
        path: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Option<Value>> {
        match routing::split_head(path) {
            (head, Some(rest)) => {
                let worker = self
                    .workers
                    .get(head)
                    .ok_or_else(|| ArpeggioError::UnknownService(head.to_string()))?;
                let (name, args) = routing::proxy_args(rest, args);
                let report = worker.execute(name, args, kwargs).await?;
                if let Some(output) = &report.output {
                    info!(worker = %head, "{}", output);
                }
                report.into_result()
            }
            (name, None) => self.dispatch_local(name, args, kwargs).await,
        }
    }

    /// Dispatch a single-segment command against local capabilities
    async fn dispatch_local(
        &mut self,
        name: &str,
        mut args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Option<Value>> {
        match name {
            PROXY_KEYWORD => {
                if args.is_empty() {
                    return Err(ArpeggioError::InvalidMessage(
                        "proxy requires a path argument".into(),
                    ));
                }
                let path = match args.remove(0) {
                    Value::String(path) => path,
                    other => {
                        return Err(ArpeggioError::InvalidMessage(format!(
                            "proxy path must be a string, got {}",
                            other
                        )))
                    }
                };
                Box::pin(self.dispatch(&path, args, kwargs)).await
            }
            "get_services" => Ok(Some(json!(self.services()))),
            "get_context" => Ok(Some(json!(self.context))),
            "add_context" => {
                if let Some(arg) = args.into_iter().next() {
                    match arg {
                        Value::Object(map) => self.merge_context(map),
                        other => {
                            return Err(ArpeggioError::InvalidMessage(format!(
                                "add_context expects a mapping, got {}",
                                other
                            )))
                        }
                    }
                }
                self.merge_context(kwargs);
                Ok(None)
            }
            "get_extensions" => Ok(Some(json!(self.extensions_map()))),
            _ => {
                if let Some(spec) = self.sequences.get(name).cloned() {
                    let report = self.run_sequence(&spec, args, kwargs).await?;
                    Ok(Some(Value::Object(report)))
                } else if let Some(&index) = self.capabilities.get(name) {
                    self.extensions[index].execute(name, &args, &kwargs)
                } else {
                    Err(ArpeggioError::UnknownKeyword(name.to_string()))
                }
            }
        }
    }

    /// Child services: name -> address
    pub fn services(&self) -> BTreeMap<String, String> {
        self.workers
            .iter()
            .map(|(name, worker)| (name.clone(), worker.address().to_string()))
            .collect()
    }

    /// Registered extensions: name -> exposed keyword names
    pub fn extensions_map(&self) -> BTreeMap<String, Vec<String>> {
        self.extensions
            .iter()
            .map(|extension| (extension.name().to_string(), extension.keywords()))
            .collect()
    }

    /// The live context
    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Merge a mapping into the context; later values win
    pub fn merge_context(&mut self, map: serde_json::Map<String, Value>) {
        for (key, value) in map {
            self.context.insert(key, value_to_string(&value));
        }
    }

    /// Every keyword name answerable locally
    pub fn keyword_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_KEYWORDS.iter().map(|s| s.to_string()).collect();
        names.extend(self.sequences.keys().cloned());
        names.extend(self.capabilities.keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    /// Declared argument names of one local keyword
    pub fn keyword_arguments(&self, name: &str) -> Result<Vec<String>> {
        match name {
            PROXY_KEYWORD => Ok(vec!["path".to_string()]),
            "add_context" => Ok(vec!["context".to_string()]),
            "get_services" | "get_context" | "get_extensions" => Ok(Vec::new()),
            _ => {
                if let Some(spec) = self.sequences.get(name) {
                    Ok(spec.context_keys())
                } else if let Some(&index) = self.capabilities.get(name) {
                    Ok(self.extensions[index].arguments(name))
                } else {
                    Err(ArpeggioError::UnknownKeyword(name.to_string()))
                }
            }
        }
    }

    /// Terminate every owned worker process. Called exactly once, on every
    /// exit path.
    pub async fn shutdown(&mut self) {
        for worker in self.workers.values_mut() {
            worker.stop().await;
        }
    }
}

/// Render a JSON value as a context string: strings stay bare, everything
/// else keeps its JSON form
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::extension::testing::EchoExtension;
    use crate::testutil::mock_worker;
    use arpeggio_protocol::{KeywordReport, RpcCall, RpcResponse};
    use serde_json::json;
    use std::path::Path;

    fn parse(yaml: &str) -> AppConfig {
        ConfigLoader::parse(yaml, Path::new("test.yml")).unwrap()
    }

    async fn empty_router() -> Router {
        Router::new(&AppConfig::default(), Vec::new()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_local_keyword() {
        let mut router = empty_router().await;
        let err = router
            .dispatch("no_such_keyword", Vec::new(), Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArpeggioError::UnknownKeyword(name) if name == "no_such_keyword"));
    }

    #[tokio::test]
    async fn test_unknown_service_head() {
        let mut router = empty_router().await;
        let err = router
            .dispatch("ghost.leaf", Vec::new(), Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArpeggioError::UnknownService(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_context_snapshot_and_overrides() {
        std::env::set_var("ARPEGGIO_TEST_MARKER", "from-env");
        let config = parse("context:\n  stage: dev\n");
        let mut router = Router::new(&config, Vec::new()).unwrap();

        // Environment snapshot is present, config overrides win
        assert_eq!(router.context()["ARPEGGIO_TEST_MARKER"], "from-env");
        assert_eq!(router.context()["stage"], "dev");

        // add_context merges through dispatch
        router
            .dispatch(
                "add_context",
                vec![json!({"stage": "prod", "extra": 7})],
                Kwargs::new(),
            )
            .await
            .unwrap();
        assert_eq!(router.context()["stage"], "prod");
        assert_eq!(router.context()["extra"], "7");

        let value = router
            .dispatch("get_context", Vec::new(), Kwargs::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value["stage"], "prod");
    }

    #[tokio::test]
    async fn test_add_context_rejects_non_mapping() {
        let mut router = empty_router().await;
        let err = router
            .dispatch("add_context", vec![json!("not-a-map")], Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArpeggioError::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn test_extension_registration_and_dispatch() {
        let config = parse("extensions:\n  echo:\n    prefix: \">> \"\n");
        let mut router = Router::new(&config, vec![Box::new(EchoExtension::new())]).unwrap();

        let value = router
            .dispatch("echo", vec![json!("hi")], Kwargs::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, json!(">> hi"));

        let extensions = router
            .dispatch("get_extensions", Vec::new(), Kwargs::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(extensions["echo"], json!(["echo", "shout"]));
    }

    #[tokio::test]
    async fn test_unconfigured_extension_is_skipped() {
        // No extensions section: the capability never registers
        let mut router =
            Router::new(&AppConfig::default(), vec![Box::new(EchoExtension::new())]).unwrap();
        let err = router
            .dispatch("echo", vec![json!("hi")], Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArpeggioError::UnknownKeyword(_)));
        assert!(router.extensions_map().is_empty());
    }

    #[tokio::test]
    async fn test_keyword_names_and_arguments() {
        let config = parse(
            r#"
extensions:
  echo: {}
sequences:
  smoke:
    context:
      target: world
      greeting: hello
    sequence:
      get_context: []
"#,
        );
        let router = Router::new(&config, vec![Box::new(EchoExtension::new())]).unwrap();

        let names = router.keyword_names();
        for expected in ["proxy", "get_services", "smoke", "echo", "shout"] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }

        // Sequence arguments are its declared context keys, in order
        assert_eq!(router.keyword_arguments("smoke").unwrap(), vec!["target", "greeting"]);
        assert_eq!(router.keyword_arguments("proxy").unwrap(), vec!["path"]);
        assert_eq!(router.keyword_arguments("echo").unwrap(), vec!["text"]);
        assert!(router.keyword_arguments("nope").is_err());
    }

    #[tokio::test]
    async fn test_routed_dispatch_single_hop() {
        // One worker `alice`; dispatch("alice.greet.bob") must issue exactly
        // one call to alice: proxy("greet.bob", original args)
        let (port, mut seen) = mock_worker(vec![RpcResponse::Report(KeywordReport::pass(Some(
            json!("hi bob"),
        )))])
        .await;

        let config = parse(&format!(
            "services:\n  alice:\n    cmd: sleep 60\n    host: 127.0.0.1\n    port: {}\n",
            port
        ));
        let mut router = Router::new(&config, Vec::new()).unwrap();

        let value = router
            .dispatch("alice.greet.bob", vec![json!("x")], Kwargs::new())
            .await
            .unwrap();
        assert_eq!(value, Some(json!("hi bob")));

        let request = seen.recv().await.unwrap();
        match request.call {
            RpcCall::RunKeyword { name, args, .. } => {
                assert_eq!(name, PROXY_KEYWORD);
                assert_eq!(args, vec![json!("greet.bob"), json!("x")]);
            }
            other => panic!("unexpected call: {:?}", other),
        }

        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_routed_dispatch_fail_surfaces_remote_error() {
        let (port, _seen) =
            mock_worker(vec![RpcResponse::Report(KeywordReport::fail("not found"))]).await;

        let config = parse(&format!(
            "services:\n  alice:\n    cmd: sleep 60\n    host: 127.0.0.1\n    port: {}\n",
            port
        ));
        let mut router = Router::new(&config, Vec::new()).unwrap();

        let err = router
            .dispatch("alice.greet.bob", Vec::new(), Kwargs::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "not found");

        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_routed_dispatch_unreachable_worker() {
        // Bind then drop to reserve a dead port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = parse(&format!(
            "services:\n  alice:\n    cmd: sleep 60\n    host: 127.0.0.1\n    port: {}\n",
            port
        ));
        let mut router = Router::new(&config, Vec::new()).unwrap();

        let err = router
            .dispatch("alice.greet", Vec::new(), Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArpeggioError::ServiceUnreachable { .. }));

        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_proxy_keyword_unwraps_local_path() {
        // proxy("get_context") behaves exactly like dispatch("get_context")
        let mut router = empty_router().await;
        let value = router
            .dispatch("proxy", vec![json!("get_context")], Kwargs::new())
            .await
            .unwrap();
        assert!(value.is_some());
    }

    #[tokio::test]
    async fn test_get_services_lists_addresses() {
        let (port, _seen) = mock_worker(Vec::new()).await;
        let config = parse(&format!(
            "services:\n  alice:\n    cmd: sleep 60\n    host: 127.0.0.1\n    port: {}\n",
            port
        ));
        let mut router = Router::new(&config, Vec::new()).unwrap();

        let value = router
            .dispatch("get_services", Vec::new(), Kwargs::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value["alice"], json!(format!("http://127.0.0.1:{}", port)));

        router.shutdown().await;
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("bare")), "bare");
        assert_eq!(value_to_string(&json!(7)), "7");
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
    }
}
