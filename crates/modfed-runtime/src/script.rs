use crate::registry::{Container, ScopeRegistry};
use crate::LoaderError;
use async_trait::async_trait;
use modfed_schema::ScopeName;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Loads a remote's entry script.
///
/// Returns once the script has finished loading; by then it must have
/// registered its container in `registry`. Failures are reported once and
/// never retried here.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    async fn load_script(&self, url: &str, registry: &ScopeRegistry) -> Result<(), LoaderError>;
}

type RemoteScript = Vec<(ScopeName, Arc<dyn Container>)>;

/// In-memory remotes: "loading" a URL registers the containers bundled under it.
#[derive(Default)]
pub struct StaticScriptLoader {
    scripts: HashMap<String, RemoteScript>,
    loaded: Mutex<Vec<String>>,
}

impl StaticScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_remote(
        mut self,
        url: impl Into<String>,
        scope: impl Into<ScopeName>,
        container: Arc<dyn Container>,
    ) -> Self {
        self.scripts
            .entry(url.into())
            .or_default()
            .push((scope.into(), container));
        self
    }

    /// URLs loaded so far, in completion order.
    pub fn loaded(&self) -> Vec<String> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ScriptLoader for StaticScriptLoader {
    async fn load_script(&self, url: &str, registry: &ScopeRegistry) -> Result<(), LoaderError> {
        // Let sibling loads interleave, as a real script load would.
        tokio::task::yield_now().await;

        let script = self.scripts.get(url).ok_or_else(|| LoaderError::Network {
            url: url.to_owned(),
            reason: "no such script".to_owned(),
        })?;
        for (scope, container) in script {
            registry.register(scope.clone(), Arc::clone(container));
        }
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_owned());
        Ok(())
    }
}

/// Evaluates fetched remote entry scripts.
pub trait ScriptHost: Send + Sync {
    /// Run `source`, registering every container it defines in `registry`.
    fn evaluate(&self, url: &str, source: &str, registry: &ScopeRegistry) -> Result<(), String>;
}

/// Fetches remote entry scripts over HTTP and hands them to a [`ScriptHost`].
pub struct HttpScriptLoader<H: ScriptHost> {
    agent: ureq::Agent,
    host: H,
}

impl<H: ScriptHost> HttpScriptLoader<H> {
    pub fn new(host: H) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            host,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

fn fetch(agent: &ureq::Agent, url: &str) -> Result<String, LoaderError> {
    let network = |reason: String| LoaderError::Network {
        url: url.to_owned(),
        reason,
    };
    let resp = match agent.get(url).call() {
        Ok(r) => r,
        Err(ureq::Error::StatusCode(code)) => return Err(network(format!("HTTP {code}"))),
        Err(e) => return Err(network(e.to_string())),
    };
    resp.into_body()
        .read_to_string()
        .map_err(|e| network(e.to_string()))
}

#[async_trait]
impl<H: ScriptHost> ScriptLoader for HttpScriptLoader<H> {
    async fn load_script(&self, url: &str, registry: &ScopeRegistry) -> Result<(), LoaderError> {
        debug!("GET {url}");
        let agent = self.agent.clone();
        let target = url.to_owned();
        let source = tokio::task::spawn_blocking(move || fetch(&agent, &target))
            .await
            .map_err(|e| LoaderError::Network {
                url: url.to_owned(),
                reason: e.to_string(),
            })??;
        debug!("fetched {url} ({} bytes)", source.len());

        self.host
            .evaluate(url, &source, registry)
            .map_err(|reason| LoaderError::Script {
                url: url.to_owned(),
                reason,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticContainer;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    /// Serves fixed bodies by path; everything else is a 404.
    struct MockServer {
        addr: String,
        _handle: std::thread::JoinHandle<()>,
    }

    impl MockServer {
        fn start(routes: Vec<(&'static str, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = format!("http://{}", listener.local_addr().unwrap());
            let routes: HashMap<String, String> = routes
                .into_iter()
                .map(|(p, b)| (p.to_owned(), b.to_owned()))
                .collect();
            let handle = std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    let mut reader = BufReader::new(stream.try_clone().unwrap());
                    let mut request_line = String::new();
                    if reader.read_line(&mut request_line).is_err() {
                        continue;
                    }
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                            break;
                        }
                    }
                    let path = request_line.split(' ').nth(1).unwrap_or("").to_owned();
                    let response = match routes.get(&path) {
                        Some(body) => format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                            body.len()
                        ),
                        None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_owned(),
                    };
                    let _ = stream.write_all(response.as_bytes());
                    let _ = stream.flush();
                }
            });
            MockServer {
                addr,
                _handle: handle,
            }
        }
    }

    /// Treats each `register <scope>` line as a container definition.
    struct LineHost;

    impl ScriptHost for LineHost {
        fn evaluate(&self, _url: &str, source: &str, registry: &ScopeRegistry) -> Result<(), String> {
            let mut defined = 0;
            for line in source.lines() {
                if let Some(scope) = line.trim().strip_prefix("register ") {
                    registry.register(scope, Arc::new(StaticContainer::new(scope)));
                    defined += 1;
                }
            }
            if defined == 0 {
                return Err("script defines no container".to_owned());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn static_loader_registers_bundled_containers() {
        let loader = StaticScriptLoader::new().with_remote(
            "/lab/extensions/md_package/remoteEntry.js",
            "md_package",
            Arc::new(StaticContainer::new("md_package")),
        );
        let registry = ScopeRegistry::new();
        loader
            .load_script("/lab/extensions/md_package/remoteEntry.js", &registry)
            .await
            .unwrap();
        assert!(registry.contains("md_package"));
        assert_eq!(loader.loaded().len(), 1);
    }

    #[tokio::test]
    async fn static_loader_unknown_url_is_a_network_error() {
        let registry = ScopeRegistry::new();
        let err = StaticScriptLoader::new()
            .load_script("/missing.js", &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Network { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn http_loader_fetches_and_evaluates() {
        let server = MockServer::start(vec![(
            "/md_package/remoteEntry.js",
            "var _JUPYTERLAB;\nregister md_package\n",
        )]);
        let loader = HttpScriptLoader::new(LineHost);
        let registry = ScopeRegistry::new();

        let url = format!("{}/md_package/remoteEntry.js", server.addr);
        loader.load_script(&url, &registry).await.unwrap();
        assert!(registry.contains("md_package"));
    }

    #[tokio::test]
    async fn http_loader_reports_missing_script() {
        let server = MockServer::start(vec![]);
        let loader = HttpScriptLoader::new(LineHost);
        let registry = ScopeRegistry::new();

        let url = format!("{}/gone/remoteEntry.js", server.addr);
        let err = loader.load_script(&url, &registry).await.unwrap_err();
        assert!(matches!(err, LoaderError::Network { ref reason, .. } if reason == "HTTP 404"));
    }

    #[tokio::test]
    async fn http_loader_reports_evaluation_failure() {
        let server = MockServer::start(vec![("/broken.js", "syntax error")]);
        let loader = HttpScriptLoader::new(LineHost);
        let registry = ScopeRegistry::new();

        let url = format!("{}/broken.js", server.addr);
        let err = loader.load_script(&url, &registry).await.unwrap_err();
        assert!(matches!(err, LoaderError::Script { .. }));
        assert!(err.is_network());
    }
}
