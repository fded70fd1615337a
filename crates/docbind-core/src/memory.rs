//! In-process [`Transport`] test double emulating the engine subset docbind speaks.
//!
//! Indices live behind a `std::sync::RwLock`. Each index keeps two copies of
//! its documents: `live`, which every write changes, and `visible`, the
//! snapshot searches read. A refresh (`refresh=wait_for|true` on a write,
//! or `POST /{index}/_refresh`) copies `live` into `visible`, so
//! fire-and-forget writes stay invisible to search until then.
//!
//! Supported endpoints:
//!
//! | Request | Behavior |
//! |---------|----------|
//! | `HEAD /{index}` | 200 or 404 |
//! | `GET /{index}` | settings and mappings |
//! | `PUT /{index}` | create; 400 `resource_already_exists_exception` if present |
//! | `DELETE /{index}` | delete; 404 `index_not_found_exception` if absent |
//! | `PUT\|POST /{index}/_doc/{id}` | index a document |
//! | `GET /{index}/_doc/{id}` | realtime get |
//! | `DELETE /{index}/_doc/{id}` | delete; 404 `not_found` result if absent |
//! | `POST /{index}/_update/{id}` | merge `doc`; 404 `document_missing_exception` |
//! | `POST /{index}/_refresh` | make writes visible |
//! | `POST /_bulk` | `index`, `create`, `update` and `delete` actions |
//! | `POST /{index}/_search` | `match_all`, `ids`, `term`, `match_phrase`, `match_phrase_prefix`, `wildcard`, `bool` |
//!
//! Field semantics follow the index mappings: `keyword` fields compare
//! whole values (lowercased when the field has a lowercasing normalizer),
//! `text` and unmapped fields compare lowercase alphanumeric tokens. A path
//! that runs past a string value addresses a multi-field sub-field of it,
//! e.g. `name.lowercase` or the dynamic `name.keyword`. Relevance scoring is
//! not emulated: unsorted results come back in id order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use serde_json::{json, Map, Value};
use tracing::trace;

use crate::engine::{EngineRequest, EngineResponse, Method, RequestBody, Transport};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
struct Index {
    settings: Value,
    mappings: Value,
    live: BTreeMap<String, Value>,
    visible: BTreeMap<String, Value>,
}

impl Index {
    fn new(settings: Value, mappings: Value) -> Self {
        Self {
            settings,
            mappings,
            ..Self::default()
        }
    }

    fn dynamic() -> Self {
        Self::new(json!({}), json!({}))
    }

    fn refresh(&mut self) {
        self.visible = self.live.clone();
    }
}

/// An engine held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    indices: RwLock<BTreeMap<String, Index>>,
}

fn error(status: u16, kind: &str, reason: impl Into<String>) -> EngineResponse {
    let reason = reason.into();
    EngineResponse::new(
        status,
        json!({
            "error": {
                "root_cause": [{"type": kind, "reason": reason}],
                "type": kind,
                "reason": reason,
            },
            "status": status,
        }),
    )
}

fn index_not_found(index: &str) -> EngineResponse {
    let mut resp = error(404, "index_not_found_exception", "no such index");
    resp.body["error"]["index"] = json!(index);
    resp
}

fn wants_refresh(request: &EngineRequest) -> bool {
    matches!(request.param_value("refresh"), Some("true" | "wait_for" | ""))
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every index, sorted.
    pub fn index_names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn index_settings(&self, index: &str) -> Option<Value> {
        self.read().get(index).map(|i| i.settings.clone())
    }

    pub fn index_mappings(&self, index: &str) -> Option<Value> {
        self.read().get(index).map(|i| i.mappings.clone())
    }

    /// Number of documents written to `index`, visible or not.
    pub fn document_count(&self, index: &str) -> usize {
        self.read().get(index).map_or(0, |i| i.live.len())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Index>> {
        self.indices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Index>> {
        self.indices.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answers one request. Never fails; engine errors are error replies.
    pub fn handle(&self, request: &EngineRequest) -> EngineResponse {
        let path: Vec<&str> = request.path.iter().map(String::as_str).collect();
        let refresh = wants_refresh(request);
        let body = match &request.body {
            Some(RequestBody::Json(v)) => Some(v),
            _ => None,
        };
        match (request.method, path.as_slice()) {
            (Method::Post | Method::Put, ["_bulk"]) => self.bulk(None, request, refresh),
            (Method::Post | Method::Put, [index, "_bulk"]) => {
                self.bulk(Some(*index), request, refresh)
            }
            (Method::Head, [index]) => self.head(index),
            (Method::Get, [index]) => self.describe(index),
            (Method::Put, [index]) => self.create_index(index, body),
            (Method::Delete, [index]) => self.delete_index(index),
            (Method::Put | Method::Post, [index, "_doc", id]) => {
                self.index_doc(index, id, body.cloned().unwrap_or(Value::Null), refresh)
            }
            (Method::Post, [index, "_doc"]) => {
                let id = uuid::Uuid::new_v4().to_string();
                self.index_doc(index, &id, body.cloned().unwrap_or(Value::Null), refresh)
            }
            (Method::Get, [index, "_doc", id]) => self.get_doc(index, id),
            (Method::Delete, [index, "_doc", id]) => self.delete_doc(index, id, refresh),
            (Method::Post, [index, "_update", id]) => self.update_doc(index, id, body, refresh),
            (Method::Post, [index, "_refresh"]) => self.refresh(index),
            (Method::Get | Method::Post, [index, "_search"]) => self.search(index, body),
            _ => error(
                400,
                "illegal_argument_exception",
                format!("no handler for [{}]", request),
            ),
        }
    }

    fn head(&self, index: &str) -> EngineResponse {
        let status = if self.read().contains_key(index) { 200 } else { 404 };
        EngineResponse::new(status, Value::Null)
    }

    fn describe(&self, index: &str) -> EngineResponse {
        match self.read().get(index) {
            Some(i) => {
                let mut body = Map::new();
                body.insert(
                    index.to_string(),
                    json!({ "settings": i.settings, "mappings": i.mappings }),
                );
                EngineResponse::new(200, Value::Object(body))
            }
            None => index_not_found(index),
        }
    }

    fn create_index(&self, index: &str, body: Option<&Value>) -> EngineResponse {
        let mut indices = self.write();
        if indices.contains_key(index) {
            let mut resp = error(
                400,
                "resource_already_exists_exception",
                format!("index [{}] already exists", index),
            );
            resp.body["error"]["index"] = json!(index);
            return resp;
        }
        let settings = body
            .and_then(|b| b.get("settings"))
            .cloned()
            .unwrap_or_else(|| json!({}));
        let mappings = body
            .and_then(|b| b.get("mappings"))
            .cloned()
            .unwrap_or_else(|| json!({}));
        indices.insert(index.to_string(), Index::new(settings, mappings));
        EngineResponse::new(
            200,
            json!({"acknowledged": true, "shards_acknowledged": true, "index": index}),
        )
    }

    fn delete_index(&self, index: &str) -> EngineResponse {
        match self.write().remove(index) {
            Some(_) => EngineResponse::new(200, json!({"acknowledged": true})),
            None => index_not_found(index),
        }
    }

    fn index_doc(&self, index: &str, id: &str, source: Value, refresh: bool) -> EngineResponse {
        if !source.is_object() {
            return error(400, "mapper_parsing_exception", "document must be a JSON object");
        }
        let mut indices = self.write();
        let target = indices
            .entry(index.to_string())
            .or_insert_with(Index::dynamic);
        let created = target.live.insert(id.to_string(), source).is_none();
        if refresh {
            target.refresh();
        }
        let (status, result) = if created { (201, "created") } else { (200, "updated") };
        EngineResponse::new(
            status,
            json!({"_index": index, "_id": id, "result": result, "forced_refresh": refresh}),
        )
    }

    fn get_doc(&self, index: &str, id: &str) -> EngineResponse {
        let indices = self.read();
        let Some(target) = indices.get(index) else {
            return index_not_found(index);
        };
        match target.live.get(id) {
            Some(doc) => EngineResponse::new(
                200,
                json!({"_index": index, "_id": id, "found": true, "_source": doc}),
            ),
            None => EngineResponse::new(404, json!({"_index": index, "_id": id, "found": false})),
        }
    }

    fn delete_doc(&self, index: &str, id: &str, refresh: bool) -> EngineResponse {
        let mut indices = self.write();
        let Some(target) = indices.get_mut(index) else {
            return index_not_found(index);
        };
        let removed = target.live.remove(id).is_some();
        if refresh {
            target.refresh();
        }
        let (status, result) = if removed { (200, "deleted") } else { (404, "not_found") };
        EngineResponse::new(status, json!({"_index": index, "_id": id, "result": result}))
    }

    fn update_doc(
        &self,
        index: &str,
        id: &str,
        body: Option<&Value>,
        refresh: bool,
    ) -> EngineResponse {
        let Some(partial) = body.and_then(|b| b.get("doc")) else {
            return error(400, "action_request_validation_exception", "script or doc is missing");
        };
        let mut indices = self.write();
        let Some(target) = indices.get_mut(index) else {
            return index_not_found(index);
        };
        let Some(existing) = target.live.get_mut(id) else {
            let mut resp = error(404, "document_missing_exception", format!("[{}]: document missing", id));
            resp.body["error"]["index"] = json!(index);
            return resp;
        };
        merge(existing, partial);
        if refresh {
            target.refresh();
        }
        EngineResponse::new(200, json!({"_index": index, "_id": id, "result": "updated"}))
    }

    fn refresh(&self, index: &str) -> EngineResponse {
        let mut indices = self.write();
        match indices.get_mut(index) {
            Some(target) => {
                target.refresh();
                EngineResponse::new(200, json!({"_shards": {"total": 1, "successful": 1, "failed": 0}}))
            }
            None => index_not_found(index),
        }
    }

    fn bulk(&self, default_index: Option<&str>, request: &EngineRequest, refresh: bool) -> EngineResponse {
        let lines: Vec<Value> = match &request.body {
            Some(RequestBody::NdJson(lines)) => lines.clone(),
            Some(RequestBody::Json(Value::Array(lines))) => lines.clone(),
            _ => return error(400, "action_request_validation_exception", "no requests added"),
        };

        let mut items = Vec::new();
        let mut touched = Vec::new();
        let mut errors = false;
        let mut lines = lines.into_iter();
        while let Some(action) = lines.next() {
            let Some((op, meta)) = action.as_object().and_then(|o| o.iter().next()) else {
                return error(400, "illegal_argument_exception", "malformed action line");
            };
            let op = op.clone();
            let Some(index) = meta
                .get("_index")
                .and_then(Value::as_str)
                .or(default_index)
                .map(str::to_string)
            else {
                return error(400, "action_request_validation_exception", "index is missing");
            };
            let id = meta
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let resp = match op.as_str() {
                "index" | "create" => {
                    let source = lines.next().unwrap_or(Value::Null);
                    if op == "create" && self.exists(&index, &id) {
                        error(409, "version_conflict_engine_exception", format!("[{}]: document already exists", id))
                    } else {
                        self.index_doc(&index, &id, source, false)
                    }
                }
                "update" => {
                    let body = lines.next().unwrap_or(Value::Null);
                    self.update_doc(&index, &id, Some(&body), false)
                }
                "delete" => self.delete_doc(&index, &id, false),
                other => {
                    return error(
                        400,
                        "illegal_argument_exception",
                        format!("unknown bulk action [{}]", other),
                    )
                }
            };

            let mut item = json!({"_index": index, "_id": id, "status": resp.status});
            if resp.is_success() || (op == "delete" && resp.status == 404 && resp.error_type().is_none()) {
                item["result"] = resp.body.get("result").cloned().unwrap_or(Value::Null);
            } else {
                errors = true;
                item["error"] = resp.body.get("error").cloned().unwrap_or(Value::Null);
            }
            let mut wrapped = Map::new();
            wrapped.insert(op, item);
            items.push(Value::Object(wrapped));
            if !touched.contains(&index) {
                touched.push(index);
            }
        }

        if refresh {
            let mut indices = self.write();
            for name in &touched {
                if let Some(target) = indices.get_mut(name) {
                    target.refresh();
                }
            }
        }
        EngineResponse::new(200, json!({"took": 0, "errors": errors, "items": items}))
    }

    fn exists(&self, index: &str, id: &str) -> bool {
        self.read()
            .get(index)
            .is_some_and(|i| i.live.contains_key(id))
    }

    fn search(&self, index: &str, body: Option<&Value>) -> EngineResponse {
        let indices = self.read();
        let Some(target) = indices.get(index) else {
            return index_not_found(index);
        };
        let empty = json!({});
        let body = body.unwrap_or(&empty);
        let query = body.get("query").cloned().unwrap_or_else(|| json!({"match_all": {}}));
        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let sorts = match parse_sort(body.get("sort")) {
            Ok(s) => s,
            Err(reason) => return error(400, "parsing_exception", reason),
        };

        let fields = FieldResolver { index: target };
        let mut matched = Vec::new();
        for (id, doc) in &target.visible {
            match fields.matches(id, doc, &query) {
                Ok(true) => matched.push((id, doc)),
                Ok(false) => {}
                Err(reason) => return error(400, "parsing_exception", reason),
            }
        }

        if !sorts.is_empty() {
            matched.sort_by(|a, b| {
                for s in &sorts {
                    let ka = fields.sort_key(a.0, a.1, &s.field);
                    let kb = fields.sort_key(b.0, b.1, &s.field);
                    let ord = compare_keys(ka.as_ref(), kb.as_ref(), s.descending);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let total = matched.len();
        let hits: Vec<Value> = matched
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(id, doc)| {
                json!({"_index": index, "_id": id, "_score": Value::Null, "_source": doc})
            })
            .collect();
        EngineResponse::new(
            200,
            json!({
                "took": 0,
                "timed_out": false,
                "hits": {
                    "total": {"value": total, "relation": "eq"},
                    "max_score": Value::Null,
                    "hits": hits,
                }
            }),
        )
    }
}

#[async_trait]
impl Transport for InMemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, request: EngineRequest) -> Result<EngineResponse> {
        self.send_blocking(request)
    }

    fn send_blocking(&self, request: EngineRequest) -> Result<EngineResponse> {
        let response = self.handle(&request);
        trace!(transport = "memory", %request, status = response.status, "round trip");
        Ok(response)
    }
}

/// Recursive object merge; non-object values replace.
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (k, v) in p {
                match t.get_mut(k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        t.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (t, p) => *t = p.clone(),
    }
}

// ============ Field semantics ============

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Text,
    Keyword { lowercase: bool },
}

struct FieldResolver<'a> {
    index: &'a Index,
}

impl FieldResolver<'_> {
    /// How values at `path` are compared.
    fn kind(&self, path: &str) -> Kind {
        let mut props = self.index.mappings.get("properties");
        let mut current: Option<&Value> = None;
        for seg in path.split('.') {
            let next = props
                .and_then(|p| p.get(seg))
                .or_else(|| current.and_then(|c| c.pointer(&format!("/fields/{}", seg))));
            match next {
                Some(m) => {
                    current = Some(m);
                    props = m.get("properties");
                }
                None => {
                    current = None;
                    break;
                }
            }
        }
        match current.and_then(|m| m.get("type")).and_then(Value::as_str) {
            Some("keyword") => {
                let normalizer = current
                    .and_then(|m| m.get("normalizer"))
                    .and_then(Value::as_str);
                Kind::Keyword {
                    lowercase: normalizer.is_some_and(|n| self.lowercases(n)),
                }
            }
            Some("text") => Kind::Text,
            Some(_) => Kind::Keyword { lowercase: false },
            None if path.ends_with(".keyword") => Kind::Keyword { lowercase: false },
            None => Kind::Text,
        }
    }

    fn lowercases(&self, normalizer: &str) -> bool {
        let settings = &self.index.settings;
        let filters = settings
            .pointer(&format!("/analysis/normalizer/{}/filter", normalizer))
            .or_else(|| settings.pointer(&format!("/index/analysis/normalizer/{}/filter", normalizer)));
        match filters {
            Some(Value::Array(list)) => list.iter().any(|f| f == "lowercase"),
            Some(_) => false,
            None => normalizer == "lowercase",
        }
    }

    fn values<'d>(&self, doc: &'d Value, path: &str) -> Vec<&'d Value> {
        let segs: Vec<&str> = path.split('.').collect();
        let mut out = Vec::new();
        collect(doc, &segs, &mut out);
        out
    }

    fn matches(&self, id: &str, doc: &Value, query: &Value) -> std::result::Result<bool, String> {
        let Some((kind, params)) = query.as_object().and_then(|o| o.iter().next()) else {
            return Err("query must be an object with one clause".to_string());
        };
        match kind.as_str() {
            "match_all" => Ok(true),
            "match_none" => Ok(false),
            "ids" => {
                let values = params
                    .get("values")
                    .and_then(Value::as_array)
                    .ok_or("[ids] requires [values]")?;
                Ok(values.iter().any(|v| v.as_str() == Some(id)))
            }
            "term" => {
                let (field, value) = field_param(params, "value")?;
                let wanted = scalar_text(value).ok_or("[term] value must be a scalar")?;
                let kind = self.kind(field);
                Ok(self.values(doc, field).into_iter().any(|v| match (kind, scalar_text(v)) {
                    (_, None) => false,
                    (Kind::Keyword { lowercase }, Some(s)) => {
                        normalize(&s, lowercase) == normalize(&wanted, lowercase)
                    }
                    (Kind::Text, Some(s)) => v == value || tokens(&s).contains(&wanted),
                }))
            }
            "match_phrase" | "match_phrase_prefix" => {
                let prefix = kind == "match_phrase_prefix";
                let (field, value) = field_param(params, "query")?;
                let text = scalar_text(value).ok_or("phrase query must be a scalar")?;
                let kind = self.kind(field);
                Ok(self.values(doc, field).into_iter().filter_map(scalar_text).any(|s| {
                    match kind {
                        Kind::Keyword { lowercase } => {
                            let s = normalize(&s, lowercase);
                            let q = normalize(&text, lowercase);
                            if prefix {
                                s.starts_with(&q)
                            } else {
                                s == q
                            }
                        }
                        Kind::Text => phrase_matches(&tokens(&s), &tokens(&text), prefix),
                    }
                }))
            }
            "wildcard" => {
                let (field, value) = field_param(params, "value")?;
                let pattern = value.as_str().ok_or("[wildcard] value must be a string")?;
                let kind = self.kind(field);
                let matcher = match kind {
                    Kind::Keyword { lowercase } => wildcard_matcher(&normalize(pattern, lowercase))?,
                    Kind::Text => wildcard_matcher(pattern)?,
                };
                Ok(self.values(doc, field).into_iter().filter_map(scalar_text).any(|s| {
                    match kind {
                        Kind::Keyword { lowercase } => matcher.is_match(normalize(&s, lowercase)),
                        Kind::Text => tokens(&s).iter().any(|t| matcher.is_match(t)),
                    }
                }))
            }
            "bool" => self.bool_matches(id, doc, params),
            other => Err(format!("unknown query [{}]", other)),
        }
    }

    fn bool_matches(&self, id: &str, doc: &Value, params: &Value) -> std::result::Result<bool, String> {
        let must = clauses(params, "must");
        let filter = clauses(params, "filter");
        let should = clauses(params, "should");
        let must_not = clauses(params, "must_not");

        for q in must.iter().chain(filter.iter()) {
            if !self.matches(id, doc, q)? {
                return Ok(false);
            }
        }
        for q in &must_not {
            if self.matches(id, doc, q)? {
                return Ok(false);
            }
        }
        if should.is_empty() {
            return Ok(true);
        }
        let required = match params.get("minimum_should_match") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(1) as usize,
            Some(Value::String(s)) => s.parse::<usize>().map_err(|_| format!("unsupported minimum_should_match [{}]", s))?,
            _ if must.is_empty() && filter.is_empty() => 1,
            _ => 0,
        };
        let mut hits = 0;
        for q in &should {
            if self.matches(id, doc, q)? {
                hits += 1;
            }
        }
        Ok(hits >= required)
    }

    fn sort_key(&self, id: &str, doc: &Value, field: &str) -> Option<SortKey> {
        if field == "_id" {
            return Some(SortKey::Str(id.to_string()));
        }
        let lowercase = matches!(self.kind(field), Kind::Keyword { lowercase: true });
        self.values(doc, field).into_iter().next().and_then(|v| match v {
            Value::Number(n) => n.as_f64().map(SortKey::Num),
            Value::Bool(b) => Some(SortKey::Bool(*b)),
            Value::String(s) => Some(SortKey::Str(normalize(s, lowercase))),
            _ => None,
        })
    }
}

fn clauses<'p>(params: &'p Value, key: &str) -> Vec<&'p Value> {
    match params.get(key) {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(v) => vec![v],
        None => Vec::new(),
    }
}

fn collect<'d>(value: &'d Value, segs: &[&str], out: &mut Vec<&'d Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect(item, segs, out);
            }
        }
        Value::Object(map) => {
            if let Some((first, rest)) = segs.split_first() {
                if let Some(v) = map.get(*first) {
                    collect(v, rest, out);
                }
            }
        }
        Value::Null => {}
        // Remaining segments name a multi-field of this scalar.
        scalar => out.push(scalar),
    }
}

fn field_param<'q>(params: &'q Value, key: &str) -> std::result::Result<(&'q str, &'q Value), String> {
    let (field, inner) = params
        .as_object()
        .and_then(|o| o.iter().next())
        .ok_or("query clause must name a field")?;
    let value = match inner {
        Value::Object(o) => o.get(key).ok_or(format!("[{}] is required", key))?,
        v => v,
    };
    Ok((field.as_str(), value))
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn normalize(s: &str, lowercase: bool) -> String {
    if lowercase {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}

fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Consecutive token match; with `prefix` the last query token only needs
/// to start the corresponding field token.
fn phrase_matches(field: &[String], query: &[String], prefix: bool) -> bool {
    if query.is_empty() || query.len() > field.len() {
        return false;
    }
    let last = query.len() - 1;
    field.windows(query.len()).any(|window| {
        window.iter().zip(query).enumerate().all(|(i, (f, q))| {
            if prefix && i == last {
                f.starts_with(q.as_str())
            } else {
                f == q
            }
        })
    })
}

/// Matcher for an engine wildcard pattern: `*` is any run, `?` one char,
/// everything else literal.
fn wildcard_matcher(pattern: &str) -> std::result::Result<GlobMatcher, String> {
    let mut escaped = String::with_capacity(pattern.len() + 4);
    let mut after_star = false;
    for c in pattern.chars() {
        if c == '*' && after_star {
            continue;
        }
        after_star = c == '*';
        if matches!(c, '\\' | '[' | ']' | '{' | '}') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    GlobBuilder::new(&escaped)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| format!("[wildcard] {}", e))
}

// ============ Sorting ============

struct SortSpec {
    field: String,
    descending: bool,
}

fn parse_sort(sort: Option<&Value>) -> std::result::Result<Vec<SortSpec>, String> {
    let items: Vec<&Value> = match sort {
        None => return Ok(Vec::new()),
        Some(Value::Array(list)) => list.iter().collect(),
        Some(v) => vec![v],
    };
    let mut out = Vec::new();
    for item in items {
        let (field, order) = match item {
            Value::String(f) => (f.clone(), "asc"),
            Value::Object(o) => {
                let (f, spec) = o.iter().next().ok_or("empty sort clause")?;
                let order = match spec {
                    Value::String(s) => s.as_str(),
                    Value::Object(p) => p.get("order").and_then(Value::as_str).unwrap_or("asc"),
                    _ => return Err(format!("malformed sort clause for [{}]", f)),
                };
                (f.clone(), order)
            }
            _ => return Err("malformed sort clause".to_string()),
        };
        if field == "_score" {
            continue;
        }
        let descending = match order {
            "asc" => false,
            "desc" => true,
            other => return Err(format!("unknown sort order [{}]", other)),
        };
        out.push(SortSpec { field, descending });
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Num(_) => 1,
            Self::Str(_) => 2,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Num(a), Self::Num(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

/// Missing values sort last in either direction.
fn compare_keys(a: Option<&SortKey>, b: Option<&SortKey>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) if descending => b.compare(a),
        (Some(a), Some(b)) => a.compare(b),
    }
}
