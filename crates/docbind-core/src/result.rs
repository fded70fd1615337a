//! Projection of engine search replies onto typed results.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::engine::EngineResponse;
use crate::error::{Error, Result};

/// The engine reply a result was projected from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
    /// The request body, kept only when `disable_direct_streaming` is set.
    pub request: Option<Value>,
}

/// One page of a search.
#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    /// Matching documents in engine order.
    pub documents: Vec<T>,
    /// Total number of matches, independent of the page size.
    pub total: u64,
    pub raw: RawResponse,
}

impl<T> SearchResult<T> {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A hit with its engine identifier, before the identifier is dropped.
#[derive(Debug)]
pub(crate) struct Hit<T> {
    pub id: String,
    pub document: T,
}

/// Reads `hits.total`, which is `{"value": n, ...}` on current engines and
/// a bare number on older ones.
pub(crate) fn total_hits(body: &Value) -> u64 {
    match body.pointer("/hits/total") {
        Some(Value::Object(obj)) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
        Some(v) => v.as_u64().unwrap_or(0),
        None => 0,
    }
}

pub(crate) fn parse_hits<T: DeserializeOwned>(body: &Value) -> Result<Vec<Hit<T>>> {
    let Some(hits) = body.pointer("/hits/hits").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let id = hit
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let source = hit.get("_source").cloned().unwrap_or(Value::Null);
        let document = serde_json::from_value(source).map_err(Error::Serialization)?;
        out.push(Hit { id, document });
    }
    Ok(out)
}

/// Projects a successful search reply.
pub(crate) fn project<T: DeserializeOwned>(
    response: EngineResponse,
    request: Option<Value>,
) -> Result<SearchResult<T>> {
    let documents = parse_hits(&response.body)?
        .into_iter()
        .map(|h| h.document)
        .collect();
    let total = total_hits(&response.body);
    Ok(SearchResult {
        documents,
        total,
        raw: RawResponse {
            status: response.status,
            body: response.body,
            request,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Example {
        name: String,
    }

    fn reply() -> Value {
        json!({
            "took": 1,
            "hits": {
                "total": {"value": 7, "relation": "eq"},
                "hits": [
                    {"_index": "examples", "_id": "a", "_source": {"name": "Example A"}},
                    {"_index": "examples", "_id": "b", "_source": {"name": "Example B"}}
                ]
            }
        })
    }

    #[test]
    fn projects_sources_and_total() {
        let result: SearchResult<Example> =
            project(EngineResponse::new(200, reply()), None).unwrap();
        assert_eq!(result.total, 7);
        assert_eq!(result.len(), 2);
        assert_eq!(result.documents[1].name, "Example B");
        assert_eq!(result.raw.status, 200);
        assert!(result.raw.request.is_none());
    }

    #[test]
    fn legacy_numeric_total() {
        assert_eq!(total_hits(&json!({"hits": {"total": 3, "hits": []}})), 3);
        assert_eq!(total_hits(&json!({})), 0);
    }

    #[test]
    fn hits_keep_identifiers() {
        let hits: Vec<Hit<Example>> = parse_hits(&reply()).unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
    }

    #[test]
    fn mismatched_source_is_serialization_error() {
        let body = json!({"hits": {"total": 1, "hits": [{"_id": "x", "_source": {"other": 1}}]}});
        let err = project::<Example>(EngineResponse::new(200, body), None).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
