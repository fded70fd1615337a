//! Engine transport seam.
//!
//! The [`Transport`] trait is the only way this crate reaches the storage
//! engine. Requests are plain values ([`EngineRequest`]) describing an
//! Elasticsearch-style REST call; replies are ([`EngineResponse`]) status
//! plus JSON body. Non-2xx replies are returned as responses, not errors,
//! because several of them (404 on delete, 400 on a create race) are
//! meaningful to the caller. Only failures where no reply arrived are
//! [`Error::Transport`](crate::error::Error::Transport).
//!
//! Each transport offers two forms of the same round trip: an async
//! [`send`](Transport::send) and a thread-blocking
//! [`send_blocking`](Transport::send_blocking).

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// Newline-delimited JSON, one value per line (bulk API).
    NdJson(Vec<Value>),
}

impl RequestBody {
    /// JSON rendering used for diagnostics.
    pub fn to_diagnostic(&self) -> Value {
        match self {
            Self::Json(v) => v.clone(),
            Self::NdJson(lines) => Value::Array(lines.clone()),
        }
    }
}

/// One REST call against the engine.
///
/// `path` holds unescaped path segments; transports are responsible for
/// encoding them.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub method: Method,
    pub path: Vec<String>,
    pub params: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl EngineRequest {
    pub fn new<I, S>(method: Method, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            path: path.into_iter().map(Into::into).collect(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn ndjson(mut self, lines: Vec<Value>) -> Self {
        self.body = Some(RequestBody::NdJson(lines));
        self
    }

    /// Value of a query parameter, if present.
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for EngineRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method.as_str(), self.path.join("/"))?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, k, v)?;
        }
        Ok(())
    }
}

/// Engine reply: HTTP status and JSON body (`Null` when empty).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    pub status: u16,
    pub body: Value,
}

impl EngineResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `error.type` of an engine error body, e.g.
    /// `resource_already_exists_exception`.
    pub fn error_type(&self) -> Option<&str> {
        self.body
            .get("error")
            .and_then(|e| e.get("type"))
            .and_then(|t| t.as_str())
    }
}

/// Carries engine requests to a storage engine.
///
/// Implementations must be `Send + Sync`; one transport is shared by every
/// collection handle of a context. Both methods perform exactly one round
/// trip and must behave identically apart from how they wait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs (e.g. `"http"`, `"memory"`).
    fn name(&self) -> &str;

    async fn send(&self, request: EngineRequest) -> Result<EngineResponse>;

    /// Thread-blocking form of [`send`](Transport::send). Must not be called
    /// from within an async runtime worker.
    fn send_blocking(&self, request: EngineRequest) -> Result<EngineResponse>;
}
