//! HTTP transport over `reqwest`.
//!
//! With one endpoint every request goes to that node. With several, requests
//! rotate round-robin across the nodes and a request whose connection
//! could not be established moves on to the next node. Once a node has
//! accepted the connection its reply (or failure) is final; nothing is
//! retried after that point.
//!
//! The async client is built up front. The blocking client is built on first
//! use, so contexts that only use the async forms never start its
//! background runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use docbind_core::{Auth, ConnectionConfig, EngineRequest, EngineResponse, Error, Method, RequestBody, Result, Transport};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::Value;
use tracing::trace;

const NDJSON: &str = "application/x-ndjson";
const JSON: &str = "application/json";

/// Node selection strategy.
#[derive(Debug)]
enum NodePool {
    Single(Url),
    Multi { nodes: Vec<Url>, cursor: AtomicUsize },
}

impl NodePool {
    fn new(nodes: Vec<Url>) -> Self {
        if nodes.len() == 1 {
            Self::Single(nodes[0].clone())
        } else {
            Self::Multi {
                nodes,
                cursor: AtomicUsize::new(0),
            }
        }
    }

    /// Nodes to try for the next request, in order.
    fn candidates(&self) -> Vec<&Url> {
        match self {
            Self::Single(url) => vec![url],
            Self::Multi { nodes, cursor } => {
                let start = cursor.fetch_add(1, Ordering::Relaxed) % nodes.len();
                nodes[start..].iter().chain(nodes[..start].iter()).collect()
            }
        }
    }
}

struct Prepared {
    method: reqwest::Method,
    url: Url,
    body: Option<(String, &'static str)>,
}

/// [`Transport`] speaking the engine's REST API over HTTP.
pub struct HttpTransport {
    nodes: NodePool,
    auth: Option<Auth>,
    timeout: Duration,
    client: reqwest::Client,
    blocking: Mutex<Option<reqwest::blocking::Client>>,
}

impl HttpTransport {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let nodes = config
            .endpoints
            .iter()
            .map(|e| {
                Url::parse(e.trim()).map_err(|err| {
                    Error::Configuration(format!("invalid endpoint '{}': {}", e, err))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if nodes.is_empty() {
            return Err(Error::Configuration(
                "no engine endpoints configured".to_string(),
            ));
        }
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            nodes: NodePool::new(nodes),
            auth: config.auth.clone(),
            timeout,
            client,
            blocking: Mutex::new(None),
        })
    }

    /// Opener for [`docbind_core::ContextBuilder::connect`].
    pub fn open(config: &ConnectionConfig) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(Self::new(config)?))
    }

    fn blocking_client(&self) -> Result<reqwest::blocking::Client> {
        let mut slot = self.blocking.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    fn prepare(&self, node: &Url, request: &EngineRequest) -> Result<Prepared> {
        let mut url = node.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                Error::Configuration(format!("endpoint '{}' cannot be a base URL", node))
            })?;
            segments.pop_if_empty();
            for segment in &request.path {
                segments.push(segment);
            }
        }
        if !request.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.params);
        }
        let body = match &request.body {
            None => None,
            Some(RequestBody::Json(v)) => Some((serde_json::to_string(v)?, JSON)),
            Some(RequestBody::NdJson(lines)) => {
                let mut out = String::new();
                for line in lines {
                    out.push_str(&serde_json::to_string(line)?);
                    out.push('\n');
                }
                Some((out, NDJSON))
            }
        };
        Ok(Prepared {
            method: method(request.method),
            url,
            body,
        })
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Empty bodies read as `Null`, non-JSON bodies as a string.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn unreachable(tried: usize, last: Option<reqwest::Error>) -> Error {
    match last {
        Some(e) => Error::connection(format!(
            "no engine node reachable ({} tried): {}",
            tried, e
        )),
        None => Error::connection("no engine node reachable"),
    }
}

/// Body, content type and credentials, applied the same way to the async
/// and blocking request builders.
trait Dress: Sized {
    fn with_body(self, body: String, content_type: &'static str) -> Self;
    fn with_basic(self, username: &str, password: &str) -> Self;
    fn with_bearer(self, token: &str) -> Self;

    fn dress(self, body: Option<(String, &'static str)>, auth: Option<&Auth>) -> Self {
        let builder = match body {
            Some((body, content_type)) => self.with_body(body, content_type),
            None => self,
        };
        match auth {
            Some(Auth::Basic { username, password }) => builder.with_basic(username, password),
            Some(Auth::Bearer { token }) => builder.with_bearer(token),
            None => builder,
        }
    }
}

impl Dress for reqwest::RequestBuilder {
    fn with_body(self, body: String, content_type: &'static str) -> Self {
        self.header(CONTENT_TYPE, content_type).body(body)
    }
    fn with_basic(self, username: &str, password: &str) -> Self {
        self.basic_auth(username, Some(password))
    }
    fn with_bearer(self, token: &str) -> Self {
        self.bearer_auth(token)
    }
}

impl Dress for reqwest::blocking::RequestBuilder {
    fn with_body(self, body: String, content_type: &'static str) -> Self {
        self.header(CONTENT_TYPE, content_type).body(body)
    }
    fn with_basic(self, username: &str, password: &str) -> Self {
        self.basic_auth(username, Some(password))
    }
    fn with_bearer(self, token: &str) -> Self {
        self.bearer_auth(token)
    }
}

fn reply(node: &Url, request: &EngineRequest, status: u16, text: &str) -> EngineResponse {
    trace!(transport = "http", node = %node, %request, status, "round trip");
    EngineResponse::new(status, parse_body(text))
}

fn skip(node: &Url, e: reqwest::Error) -> reqwest::Error {
    trace!(transport = "http", node = %node, error = %e, "node unreachable");
    e
}

fn read_failed(e: reqwest::Error) -> Error {
    Error::connection(format!("failed to read reply: {}", e))
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: EngineRequest) -> Result<EngineResponse> {
        let candidates = self.nodes.candidates();
        let tried = candidates.len();
        let mut last = None;
        for node in candidates {
            let prepared = self.prepare(node, &request)?;
            let builder = self
                .client
                .request(prepared.method, prepared.url)
                .dress(prepared.body, self.auth.as_ref());
            match builder.send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let text = resp.text().await.map_err(read_failed)?;
                    return Ok(reply(node, &request, status, &text));
                }
                Err(e) if e.is_connect() => last = Some(skip(node, e)),
                Err(e) => return Err(Error::connection(format!("{} failed: {}", request, e))),
            }
        }
        Err(unreachable(tried, last))
    }

    fn send_blocking(&self, request: EngineRequest) -> Result<EngineResponse> {
        let client = self.blocking_client()?;
        let candidates = self.nodes.candidates();
        let tried = candidates.len();
        let mut last = None;
        for node in candidates {
            let prepared = self.prepare(node, &request)?;
            let builder = client
                .request(prepared.method, prepared.url)
                .dress(prepared.body, self.auth.as_ref());
            match builder.send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let text = resp.text().map_err(read_failed)?;
                    return Ok(reply(node, &request, status, &text));
                }
                Err(e) if e.is_connect() => last = Some(skip(node, e)),
                Err(e) => return Err(Error::connection(format!("{} failed: {}", request, e))),
            }
        }
        Err(unreachable(tried, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(endpoints: &[&str]) -> HttpTransport {
        HttpTransport::new(&ConnectionConfig::new(endpoints.iter().copied())).unwrap()
    }

    #[test]
    fn single_endpoint_always_first() {
        let t = transport(&["http://localhost:9200"]);
        for _ in 0..3 {
            let c = t.nodes.candidates();
            assert_eq!(c.len(), 1);
            assert_eq!(c[0].as_str(), "http://localhost:9200/");
        }
    }

    #[test]
    fn multiple_endpoints_rotate() {
        let t = transport(&["http://a:9200", "http://b:9200", "http://c:9200"]);
        let first: Vec<String> = t.nodes.candidates().iter().map(|u| u.host_str().unwrap().to_string()).collect();
        let second: Vec<String> = t.nodes.candidates().iter().map(|u| u.host_str().unwrap().to_string()).collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(second, vec!["b", "c", "a"]);
    }

    #[test]
    fn async_and_blocking_requests_carry_the_same_headers() {
        let auths = [
            Auth::Basic {
                username: "elastic".into(),
                password: "changeme".into(),
            },
            Auth::Bearer { token: "t0k3n".into() },
        ];
        let async_client = reqwest::Client::new();
        let blocking_client = reqwest::blocking::Client::new();
        for auth in &auths {
            let body = || Some(("{}\n".to_string(), NDJSON));
            let a = async_client
                .post("http://localhost:9200/_bulk")
                .dress(body(), Some(auth))
                .build()
                .unwrap();
            let b = blocking_client
                .post("http://localhost:9200/_bulk")
                .dress(body(), Some(auth))
                .build()
                .unwrap();
            assert_eq!(a.headers(), b.headers());
            assert_eq!(a.headers()[CONTENT_TYPE], NDJSON);
            assert!(a.headers().contains_key(reqwest::header::AUTHORIZATION));
        }
        let bare = async_client.get("http://localhost:9200/").dress(None, None).build().unwrap();
        assert!(bare.headers().is_empty());
    }

    #[test]
    fn segments_and_params_are_encoded() {
        let t = transport(&["http://localhost:9200/prefix/"]);
        let node = t.nodes.candidates()[0].clone();
        let req = EngineRequest::new(Method::Put, ["local-examples", "_doc", "a b/c"])
            .param("refresh", "wait_for")
            .json(json!({"name": "x"}));
        let p = t.prepare(&node, &req).unwrap();
        assert_eq!(
            p.url.as_str(),
            "http://localhost:9200/prefix/local-examples/_doc/a%20b%2Fc?refresh=wait_for"
        );
        assert_eq!(p.body, Some((r#"{"name":"x"}"#.to_string(), JSON)));
    }

    #[test]
    fn ndjson_lines_end_with_newline() {
        let t = transport(&["http://localhost:9200"]);
        let node = t.nodes.candidates()[0].clone();
        let req = EngineRequest::new(Method::Post, ["_bulk"])
            .ndjson(vec![json!({"index": {"_id": "1"}}), json!({"n": 1})]);
        let p = t.prepare(&node, &req).unwrap();
        assert_eq!(
            p.body,
            Some(("{\"index\":{\"_id\":\"1\"}}\n{\"n\":1}\n".to_string(), NDJSON))
        );
    }

    #[test]
    fn invalid_endpoint_is_configuration_error() {
        let err = HttpTransport::new(&ConnectionConfig::new(["not a url"])).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn reply_bodies() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_body("plain"), json!("plain"));
    }
}
