//! Query composition.
//!
//! [`Query`] is a small predicate tree that serializes to the engine's
//! query DSL. The canned search shapes are built here:
//!
//! | Shape | Clause per field | Combination |
//! |-------|------------------|-------------|
//! | [`starts_with`] | `match_phrase_prefix` | `bool.should`, at least one |
//! | [`exact_match`] | `match_phrase` | `bool.should`, at least one |
//! | [`wildcard`] | `wildcard` | single field only |
//!
//! Anything else is expressed by building a [`Query`] directly, or with
//! [`Query::Raw`] as a last resort.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::field::{Field, Sort};
use crate::models::DocumentId;

/// A search predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    /// Documents whose identifier is one of the values.
    Ids(Vec<String>),
    /// Field contains the text as a whole phrase.
    MatchPhrase { field: Field, text: String },
    /// Field contains the text as a phrase whose last term is a prefix.
    MatchPhrasePrefix { field: Field, text: String },
    /// Field matches a glob pattern (`*`, `?`).
    Wildcard { field: Field, pattern: String },
    /// Field holds exactly this value.
    Term { field: Field, value: Value },
    Bool(BoolQuery),
    /// Engine query DSL passed through untouched.
    Raw(Value),
}

/// Boolean combination of queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub filter: Vec<Query>,
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<u32>,
}

impl Query {
    pub fn ids<I, D>(ids: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DocumentId>,
    {
        Self::Ids(ids.into_iter().map(|id| id.into().as_wire()).collect())
    }

    pub fn match_phrase(field: impl Into<Field>, text: impl Into<String>) -> Self {
        Self::MatchPhrase {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn match_phrase_prefix(field: impl Into<Field>, text: impl Into<String>) -> Self {
        Self::MatchPhrasePrefix {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn wildcard(field: impl Into<Field>, pattern: impl Into<String>) -> Self {
        Self::Wildcard {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn term(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Matches when at least one clause matches.
    pub fn any_of(clauses: Vec<Query>) -> Self {
        Self::Bool(BoolQuery {
            should: clauses,
            minimum_should_match: Some(1),
            ..BoolQuery::default()
        })
    }

    /// Matches when every clause matches.
    pub fn all_of(clauses: Vec<Query>) -> Self {
        Self::Bool(BoolQuery {
            must: clauses,
            ..BoolQuery::default()
        })
    }

    pub fn negate(query: Query) -> Self {
        Self::Bool(BoolQuery {
            must_not: vec![query],
            ..BoolQuery::default()
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::Ids(values) => json!({ "ids": { "values": values } }),
            Self::MatchPhrase { field, text } => {
                field_clause("match_phrase", field, json!({ "query": text }))
            }
            Self::MatchPhrasePrefix { field, text } => {
                field_clause("match_phrase_prefix", field, json!({ "query": text }))
            }
            Self::Wildcard { field, pattern } => {
                field_clause("wildcard", field, json!({ "value": pattern }))
            }
            Self::Term { field, value } => field_clause("term", field, json!({ "value": value })),
            Self::Bool(b) => b.to_json(),
            Self::Raw(v) => v.clone(),
        }
    }
}

impl BoolQuery {
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (key, clauses) in [
            ("must", &self.must),
            ("should", &self.should),
            ("filter", &self.filter),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                out.insert(
                    key.to_string(),
                    Value::Array(clauses.iter().map(Query::to_json).collect()),
                );
            }
        }
        if let Some(n) = self.minimum_should_match {
            out.insert("minimum_should_match".to_string(), json!(n));
        }
        json!({ "bool": Value::Object(out) })
    }
}

fn field_clause(kind: &str, field: &Field, params: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field.path().to_string(), params);
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn per_field<F>(fields: &[Field], clause: F) -> Result<Query>
where
    F: Fn(&Field) -> Query,
{
    if fields.is_empty() {
        return Err(Error::InvalidQuery(
            "at least one field is required".to_string(),
        ));
    }
    Ok(Query::any_of(fields.iter().map(clause).collect()))
}

/// Any of `fields` starts with `text` (phrase-prefix).
pub fn starts_with(text: &str, fields: &[Field]) -> Result<Query> {
    per_field(fields, |f| Query::match_phrase_prefix(f, text))
}

/// Any of `fields` contains `text` as a whole phrase.
pub fn exact_match(text: &str, fields: &[Field]) -> Result<Query> {
    per_field(fields, |f| Query::match_phrase(f, text))
}

/// `field` matches the glob `pattern`.
pub fn wildcard(pattern: &str, field: impl Into<Field>) -> Query {
    Query::wildcard(field, pattern)
}

/// A complete search: predicate, page window and ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Query,
    pub skip: u64,
    pub take: u64,
    pub sort: Vec<Sort>,
}

impl SearchRequest {
    /// First ten matches in relevance order.
    pub fn new(query: Query) -> Self {
        Self {
            query,
            skip: 0,
            take: 10,
            sort: Vec::new(),
        }
    }

    pub fn page(mut self, skip: u64, take: u64) -> Self {
        self.skip = skip;
        self.take = take;
        self
    }

    /// Appends a sort key; keys apply in insertion order.
    pub fn sort_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn sorted(mut self, sort: Option<Sort>) -> Self {
        if let Some(s) = sort {
            self.sort.push(s);
        }
        self
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "query": self.query.to_json(),
            "from": self.skip,
            "size": self.take,
            "track_total_hits": true,
        });
        if !self.sort.is_empty() {
            body["sort"] = Value::Array(self.sort.iter().map(Sort::to_json).collect());
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn starts_with_ors_phrase_prefix_per_field() {
        let q = starts_with("exam", &[Field::new("name"), Field::new("description")]).unwrap();
        assert_eq!(
            q.to_json(),
            json!({
                "bool": {
                    "should": [
                        {"match_phrase_prefix": {"name": {"query": "exam"}}},
                        {"match_phrase_prefix": {"description": {"query": "exam"}}}
                    ],
                    "minimum_should_match": 1
                }
            })
        );
    }

    #[test]
    fn exact_match_uses_match_phrase() {
        let q = exact_match("Desc", &[Field::new("description")]).unwrap();
        assert_eq!(
            q.to_json()["bool"]["should"][0],
            json!({"match_phrase": {"description": {"query": "Desc"}}})
        );
    }

    #[test]
    fn empty_field_list_rejected() {
        assert!(matches!(
            starts_with("exam", &[]),
            Err(Error::InvalidQuery(_))
        ));
        assert!(exact_match("exam", &[]).is_err());
    }

    #[test]
    fn wildcard_single_clause() {
        let q = wildcard("ex*le ?", Field::new("name").suffix("lowercase"));
        assert_eq!(
            q.to_json(),
            json!({"wildcard": {"name.lowercase": {"value": "ex*le ?"}}})
        );
    }

    #[test]
    fn ids_accept_mixed_identifier_kinds() {
        let guid = Uuid::parse_str("65265d38-44d5-49ae-b6d3-5fc18cd81939").unwrap();
        let q = Query::Ids(vec![
            DocumentId::from(guid).as_wire(),
            DocumentId::from(7i64).as_wire(),
        ]);
        assert_eq!(
            q.to_json(),
            json!({"ids": {"values": ["65265d38-44d5-49ae-b6d3-5fc18cd81939", "7"]}})
        );
        assert_eq!(Query::ids(["a", "b"]), Query::Ids(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn bool_omits_empty_sections() {
        let q = Query::all_of(vec![Query::term("status", "open")]);
        assert_eq!(
            q.to_json(),
            json!({"bool": {"must": [{"term": {"status": {"value": "open"}}}]}})
        );
        let neg = Query::negate(Query::MatchAll);
        assert_eq!(neg.to_json(), json!({"bool": {"must_not": [{"match_all": {}}]}}));
    }

    #[test]
    fn search_request_body() {
        let req = SearchRequest::new(Query::MatchAll)
            .page(20, 5)
            .sort_by(Sort::ascending("name.lowercase"))
            .sort_by(Sort::descending("created"));
        let body = req.to_json();
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 5);
        assert_eq!(body["track_total_hits"], true);
        assert_eq!(
            body["sort"],
            json!([
                {"name.lowercase": {"order": "asc"}},
                {"created": {"order": "desc"}}
            ])
        );
    }

    #[test]
    fn no_sort_key_without_sort() {
        let body = SearchRequest::new(Query::MatchAll).sorted(None).to_json();
        assert!(body.get("sort").is_none());
    }

    #[test]
    fn raw_passes_through() {
        let raw = json!({"range": {"age": {"gte": 18}}});
        assert_eq!(Query::Raw(raw.clone()).to_json(), raw);
    }
}
