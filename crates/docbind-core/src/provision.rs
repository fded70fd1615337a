//! Idempotent creation and removal of physical partitions.
//!
//! Both directions check existence first (`HEAD /{index}`) and then act.
//! A concurrent creator or deleter can win the race between the check and
//! the action, so the engine's "already exists" and "not found" replies to
//! the action itself count as success.

use serde_json::{json, Value};
use tracing::debug;

use crate::binding::CollectionBinding;
use crate::config::ConnectionConfig;
use crate::engine::{EngineRequest, EngineResponse, Method, Transport};
use crate::error::{Error, Result};

const ALREADY_EXISTS: &str = "resource_already_exists_exception";
const INDEX_NOT_FOUND: &str = "index_not_found_exception";

/// Ensures or drops the partitions behind collection bindings.
pub struct Provisioner<'a> {
    transport: &'a dyn Transport,
    config: &'a ConnectionConfig,
}

impl<'a> Provisioner<'a> {
    pub fn new(transport: &'a dyn Transport, config: &'a ConnectionConfig) -> Self {
        Self { transport, config }
    }

    /// Creates the partition if absent. Returns whether this call created it.
    pub async fn ensure_exists(&self, binding: &CollectionBinding) -> Result<bool> {
        let index = binding.physical_name.as_str();
        let head = self.transport.send(exists_request(index)).await?;
        if exists(index, &head)? {
            debug!(index, "index already present");
            return Ok(false);
        }
        let create = create_request(self.config, binding);
        let diag = self.diagnostic_request(&create);
        let resp = self.transport.send(create).await?;
        created(index, resp, diag)
    }

    pub fn ensure_exists_blocking(&self, binding: &CollectionBinding) -> Result<bool> {
        let index = binding.physical_name.as_str();
        let head = self.transport.send_blocking(exists_request(index))?;
        if exists(index, &head)? {
            debug!(index, "index already present");
            return Ok(false);
        }
        let create = create_request(self.config, binding);
        let diag = self.diagnostic_request(&create);
        let resp = self.transport.send_blocking(create)?;
        created(index, resp, diag)
    }

    /// Deletes the partition if present. Returns whether this call deleted it.
    pub async fn drop_if_exists(&self, binding: &CollectionBinding) -> Result<bool> {
        let index = binding.physical_name.as_str();
        let head = self.transport.send(exists_request(index)).await?;
        if !exists(index, &head)? {
            debug!(index, "index already absent");
            return Ok(false);
        }
        let resp = self.transport.send(delete_request(index)).await?;
        deleted(index, resp)
    }

    pub fn drop_if_exists_blocking(&self, binding: &CollectionBinding) -> Result<bool> {
        let index = binding.physical_name.as_str();
        let head = self.transport.send_blocking(exists_request(index))?;
        if !exists(index, &head)? {
            debug!(index, "index already absent");
            return Ok(false);
        }
        let resp = self.transport.send_blocking(delete_request(index))?;
        deleted(index, resp)
    }

    /// Whether the partition exists, without changing anything.
    pub async fn exists(&self, binding: &CollectionBinding) -> Result<bool> {
        let index = binding.physical_name.as_str();
        let head = self.transport.send(exists_request(index)).await?;
        exists(index, &head)
    }

    pub fn exists_blocking(&self, binding: &CollectionBinding) -> Result<bool> {
        let index = binding.physical_name.as_str();
        let head = self.transport.send_blocking(exists_request(index))?;
        exists(index, &head)
    }

    fn diagnostic_request(&self, request: &EngineRequest) -> Option<Value> {
        if self.config.disable_direct_streaming {
            request.body.as_ref().map(|b| b.to_diagnostic())
        } else {
            None
        }
    }
}

fn exists_request(index: &str) -> EngineRequest {
    EngineRequest::new(Method::Head, [index])
}

fn create_request(config: &ConnectionConfig, binding: &CollectionBinding) -> EngineRequest {
    EngineRequest::new(Method::Put, [binding.physical_name.as_str()])
        .json(binding.schema.create_body(config))
}

fn delete_request(index: &str) -> EngineRequest {
    EngineRequest::new(Method::Delete, [index])
}

fn exists(index: &str, head: &EngineResponse) -> Result<bool> {
    match head.status {
        200..=299 => Ok(true),
        404 => Ok(false),
        status => Err(Error::Provisioning {
            index: index.to_string(),
            message: format!("existence check returned {}", status),
            diagnostics: json!({ "status": status, "response": head.body }),
        }),
    }
}

fn created(index: &str, resp: EngineResponse, request: Option<Value>) -> Result<bool> {
    if resp.is_success() {
        debug!(index, "index created");
        return Ok(true);
    }
    if resp.error_type() == Some(ALREADY_EXISTS) {
        debug!(index, "index created concurrently");
        return Ok(false);
    }
    Err(provisioning_error(index, "create", resp, request))
}

fn deleted(index: &str, resp: EngineResponse) -> Result<bool> {
    if resp.is_success() {
        debug!(index, "index deleted");
        return Ok(true);
    }
    if resp.error_type() == Some(INDEX_NOT_FOUND) {
        debug!(index, "index deleted concurrently");
        return Ok(false);
    }
    Err(provisioning_error(index, "delete", resp, None))
}

fn provisioning_error(
    index: &str,
    action: &str,
    resp: EngineResponse,
    request: Option<Value>,
) -> Error {
    let reason = resp
        .body
        .pointer("/error/reason")
        .and_then(Value::as_str)
        .unwrap_or("unexpected reply")
        .to_string();
    let mut diagnostics = json!({ "status": resp.status, "response": resp.body });
    if let Some(req) = request {
        diagnostics["request"] = req;
    }
    Error::Provisioning {
        index: index.to_string(),
        message: format!("{} failed ({}): {}", action, resp.status, reason),
        diagnostics,
    }
}
