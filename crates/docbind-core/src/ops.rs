//! Collection operations as request plans.
//!
//! Every operation is built once as a [`Plan`]: the request to send and the
//! function that interprets the reply. [`Plan::run`] and
//! [`Plan::run_blocking`] differ only in how they wait for the transport,
//! so the async and blocking forms of an operation cannot drift apart.

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::engine::{EngineRequest, EngineResponse, Method, Transport};
use crate::error::{Error, Result};
use crate::models::{Document, DocumentId, Visibility};
use crate::query::{Query, SearchRequest};
use crate::result::{parse_hits, project, SearchResult};

type Finish<O> = Box<dyn FnOnce(EngineResponse) -> Result<O> + Send>;

/// A planned operation.
pub(crate) enum Plan<O> {
    /// Nothing to send; the outcome is already known.
    Done(O),
    Send {
        request: EngineRequest,
        finish: Finish<O>,
    },
}

impl<O> Plan<O> {
    fn send<F>(request: EngineRequest, finish: F) -> Self
    where
        F: FnOnce(EngineResponse) -> Result<O> + Send + 'static,
    {
        Self::Send {
            request,
            finish: Box::new(finish),
        }
    }

    pub async fn run(self, transport: &dyn Transport) -> Result<O> {
        match self {
            Self::Done(out) => Ok(out),
            Self::Send { request, finish } => finish(transport.send(request).await?),
        }
    }

    pub fn run_blocking(self, transport: &dyn Transport) -> Result<O> {
        match self {
            Self::Done(out) => Ok(out),
            Self::Send { request, finish } => finish(transport.send_blocking(request)?),
        }
    }

    #[cfg(test)]
    pub fn request(&self) -> Option<&EngineRequest> {
        match self {
            Self::Done(_) => None,
            Self::Send { request, .. } => Some(request),
        }
    }
}

/// Turns a non-2xx reply into a transport error.
fn expect_success(what: &str, response: &EngineResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    let reason = response
        .body
        .pointer("/error/reason")
        .and_then(Value::as_str)
        .or_else(|| response.error_type())
        .unwrap_or("unexpected reply");
    Err(Error::engine(
        format!("{} failed ({}): {}", what, response.status, reason),
        response.status,
        response.body.clone(),
    ))
}

fn search_request(index: &str, body: Value) -> EngineRequest {
    EngineRequest::new(Method::Post, [index, "_search"]).json(body)
}

pub(crate) fn get<T>(index: &str, id: DocumentId) -> Plan<Option<T>>
where
    T: DeserializeOwned + 'static,
{
    let body = json!({
        "query": Query::ids([id]).to_json(),
        "size": 1,
    });
    let what = format!("get from {}", index);
    Plan::send(search_request(index, body), move |resp| {
        expect_success(&what, &resp)?;
        Ok(parse_hits::<T>(&resp.body)?
            .into_iter()
            .next()
            .map(|h| h.document))
    })
}

/// Largest page the engine returns by default (`index.max_result_window`).
pub(crate) const MAX_RESULT_WINDOW: usize = 10_000;

/// One ids search per batch of at most [`MAX_RESULT_WINDOW`] distinct ids.
/// Concatenating the batch results keeps request order.
pub(crate) fn get_many<T>(index: &str, ids: Vec<DocumentId>) -> Vec<Plan<Vec<T>>>
where
    T: DeserializeOwned + Send + 'static,
{
    let mut seen = HashSet::new();
    let wanted: Vec<String> = ids
        .into_iter()
        .map(|id| id.as_wire())
        .filter(|id| seen.insert(id.clone()))
        .collect();
    wanted
        .chunks(MAX_RESULT_WINDOW)
        .map(|batch| get_batch(index, batch.to_vec()))
        .collect()
}

fn get_batch<T>(index: &str, wanted: Vec<String>) -> Plan<Vec<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let body = json!({
        "query": Query::Ids(wanted.clone()).to_json(),
        "size": wanted.len(),
    });
    let what = format!("get_many from {}", index);
    Plan::send(search_request(index, body), move |resp| {
        expect_success(&what, &resp)?;
        let mut by_id: HashMap<String, T> = parse_hits::<T>(&resp.body)?
            .into_iter()
            .map(|h| (h.id, h.document))
            .collect();
        Ok(wanted.iter().filter_map(|id| by_id.remove(id)).collect())
    })
}

pub(crate) fn upsert<T: Document>(index: &str, doc: &T, visibility: Visibility) -> Result<Plan<()>> {
    let id = doc.id().as_wire();
    let body = serde_json::to_value(doc)?;
    let what = format!("upsert {} into {}", id, index);
    let request = EngineRequest::new(Method::Put, [index, "_doc", id.as_str()])
        .param("refresh", visibility.refresh_param())
        .json(body);
    Ok(Plan::send(request, move |resp| expect_success(&what, &resp)))
}

/// One `_bulk` request; per-item failures in the reply are not inspected.
pub(crate) fn upsert_many<T: Document>(
    index: &str,
    docs: &[T],
    visibility: Visibility,
) -> Result<Plan<()>> {
    if docs.is_empty() {
        return Ok(Plan::Done(()));
    }
    let mut lines = Vec::with_capacity(docs.len() * 2);
    for doc in docs {
        lines.push(json!({ "index": { "_index": index, "_id": doc.id().as_wire() } }));
        lines.push(serde_json::to_value(doc)?);
    }
    let what = format!("bulk upsert into {}", index);
    let request = EngineRequest::new(Method::Post, ["_bulk"])
        .param("refresh", visibility.refresh_param())
        .ndjson(lines);
    Ok(Plan::send(request, move |resp| expect_success(&what, &resp)))
}

pub(crate) fn partial_update<P: Serialize + ?Sized>(
    index: &str,
    id: DocumentId,
    partial: &P,
    visibility: Visibility,
) -> Result<Plan<()>> {
    let body = json!({ "doc": serde_json::to_value(partial)? });
    let id = id.as_wire();
    let request = EngineRequest::new(Method::Post, [index, "_update", id.as_str()])
        .param("refresh", visibility.refresh_param())
        .json(body);
    let index = index.to_string();
    Ok(Plan::send(request, move |resp| {
        if resp.status == 404 && resp.error_type() != Some("index_not_found_exception") {
            return Err(Error::NotFound { index, id });
        }
        expect_success(&format!("partial update of {} in {}", id, index), &resp)
    }))
}

/// Deleting an absent document succeeds.
pub(crate) fn delete_by_id(index: &str, id: DocumentId, visibility: Visibility) -> Plan<()> {
    let id = id.as_wire();
    let what = format!("delete {} from {}", id, index);
    let request = EngineRequest::new(Method::Delete, [index, "_doc", id.as_str()])
        .param("refresh", visibility.refresh_param());
    Plan::send(request, move |resp| {
        if resp.status == 404 && resp.error_type().is_none() {
            return Ok(());
        }
        expect_success(&what, &resp)
    })
}

pub(crate) fn refresh(index: &str) -> Plan<()> {
    let what = format!("refresh of {}", index);
    Plan::send(
        EngineRequest::new(Method::Post, [index, "_refresh"]),
        move |resp| expect_success(&what, &resp),
    )
}

pub(crate) fn search<T>(index: &str, search: &SearchRequest, diagnostics: bool) -> Plan<SearchResult<T>>
where
    T: DeserializeOwned + 'static,
{
    let body = search.to_json();
    let kept = diagnostics.then(|| body.clone());
    let what = format!("search of {}", index);
    Plan::send(search_request(index, body), move |resp| {
        expect_success(&what, &resp)?;
        project(resp, kept)
    })
}
