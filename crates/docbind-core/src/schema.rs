//! Per-collection index settings and mappings.
//!
//! A [`SchemaRegistry`] maps a logical collection name to an
//! [`IndexSchema`]: a settings builder and a mappings builder, each a
//! closure over the [`ConnectionConfig`] so shard counts and similar values
//! can follow the connection. The registry is filled by the context owner
//! before the context is built.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::config::ConnectionConfig;

/// Builds the settings for a partition.
pub type SettingsBuilder = Arc<dyn Fn(&ConnectionConfig) -> IndexSettings + Send + Sync>;
/// Builds the mappings for a partition.
pub type MappingsBuilder = Arc<dyn Fn(&ConnectionConfig) -> Mappings + Send + Sync>;

// ============ Settings ============

/// Index-level settings sent on partition creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSettings {
    shards: Option<u32>,
    replicas: Option<u32>,
    normalizers: BTreeMap<String, Value>,
    extra: Map<String, Value>,
}

impl IndexSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shard and replica counts taken from the connection.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new().shards(config.shards).replicas(config.replicas)
    }

    pub fn shards(mut self, shards: u32) -> Self {
        self.shards = Some(shards);
        self
    }

    pub fn replicas(mut self, replicas: u32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// Declares a custom normalizer that lowercases keyword values.
    pub fn lowercase_normalizer(mut self, name: impl Into<String>) -> Self {
        self.normalizers.insert(
            name.into(),
            json!({ "type": "custom", "filter": ["lowercase"] }),
        );
        self
    }

    /// Any other setting, e.g. `refresh_interval`.
    pub fn setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Copies every key of a JSON object into the extra settings.
    pub fn merge(mut self, settings: &Value) -> Self {
        if let Some(obj) = settings.as_object() {
            for (k, v) in obj {
                self.extra.insert(k.clone(), v.clone());
            }
        }
        self
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(shards) = self.shards {
            out.insert("number_of_shards".to_string(), json!(shards));
        }
        if let Some(replicas) = self.replicas {
            out.insert("number_of_replicas".to_string(), json!(replicas));
        }
        if !self.normalizers.is_empty() {
            let normalizers: Map<String, Value> = self
                .normalizers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            out.insert(
                "analysis".to_string(),
                json!({ "normalizer": Value::Object(normalizers) }),
            );
        }
        for (k, v) in &self.extra {
            out.insert(k.clone(), v.clone());
        }
        Value::Object(out)
    }
}

// ============ Mappings ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Keyword,
    Long,
    Double,
    Boolean,
    Date,
    Object,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Keyword => "keyword",
            Self::Long => "long",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Object => "object",
        }
    }
}

/// Mapping of a single field, including multi-field sub-fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    kind: FieldKind,
    normalizer: Option<String>,
    analyzer: Option<String>,
    fields: BTreeMap<String, FieldMapping>,
    properties: BTreeMap<String, FieldMapping>,
}

impl FieldMapping {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            normalizer: None,
            analyzer: None,
            fields: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }
    pub fn keyword() -> Self {
        Self::new(FieldKind::Keyword)
    }
    pub fn long() -> Self {
        Self::new(FieldKind::Long)
    }
    pub fn double() -> Self {
        Self::new(FieldKind::Double)
    }
    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }
    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }
    pub fn object() -> Self {
        Self::new(FieldKind::Object)
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn normalizer(mut self, name: impl Into<String>) -> Self {
        self.normalizer = Some(name.into());
        self
    }

    pub fn analyzer(mut self, name: impl Into<String>) -> Self {
        self.analyzer = Some(name.into());
        self
    }

    /// Adds a multi-field sub-field, reachable as `<field>.<name>`.
    pub fn subfield(mut self, name: impl Into<String>, mapping: FieldMapping) -> Self {
        self.fields.insert(name.into(), mapping);
        self
    }

    /// Adds a nested property to an object field.
    pub fn property(mut self, name: impl Into<String>, mapping: FieldMapping) -> Self {
        self.properties.insert(name.into(), mapping);
        self
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".to_string(), json!(self.kind.as_str()));
        if let Some(n) = &self.normalizer {
            out.insert("normalizer".to_string(), json!(n));
        }
        if let Some(a) = &self.analyzer {
            out.insert("analyzer".to_string(), json!(a));
        }
        if !self.fields.is_empty() {
            out.insert("fields".to_string(), map_to_json(&self.fields));
        }
        if !self.properties.is_empty() {
            out.insert("properties".to_string(), map_to_json(&self.properties));
        }
        Value::Object(out)
    }
}

fn map_to_json(fields: &BTreeMap<String, FieldMapping>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Field mappings of a partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mappings {
    properties: BTreeMap<String, FieldMapping>,
    dynamic: Option<bool>,
    raw: Option<Value>,
}

impl Mappings {
    /// Empty mappings; the engine maps fields dynamically.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mappings given verbatim as engine JSON.
    pub fn from_json(raw: Value) -> Self {
        Self {
            raw: Some(raw),
            ..Self::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, mapping: FieldMapping) -> Self {
        self.properties.insert(name.into(), mapping);
        self
    }

    pub fn dynamic(mut self, enabled: bool) -> Self {
        self.dynamic = Some(enabled);
        self
    }

    pub fn to_json(&self) -> Value {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let mut out = Map::new();
        if let Some(dynamic) = self.dynamic {
            out.insert("dynamic".to_string(), json!(dynamic));
        }
        if !self.properties.is_empty() {
            out.insert("properties".to_string(), map_to_json(&self.properties));
        }
        Value::Object(out)
    }
}

// ============ Schema entries ============

/// The (settings-builder, mappings-builder) pair for one collection.
#[derive(Clone)]
pub struct IndexSchema {
    settings: SettingsBuilder,
    mappings: MappingsBuilder,
}

impl fmt::Debug for IndexSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSchema").finish_non_exhaustive()
    }
}

impl IndexSchema {
    pub fn new<S, M>(settings: S, mappings: M) -> Self
    where
        S: Fn(&ConnectionConfig) -> IndexSettings + Send + Sync + 'static,
        M: Fn(&ConnectionConfig) -> Mappings + Send + Sync + 'static,
    {
        Self {
            settings: Arc::new(settings),
            mappings: Arc::new(mappings),
        }
    }

    /// Shards/replicas from the connection and the given fixed mappings.
    pub fn with_mappings(mappings: Mappings) -> Self {
        Self::new(IndexSettings::from_config, move |_| mappings.clone())
    }

    /// Shards/replicas from the connection and dynamic mappings.
    pub fn dynamic() -> Self {
        Self::with_mappings(Mappings::new())
    }

    pub fn settings(&self, config: &ConnectionConfig) -> IndexSettings {
        (self.settings)(config)
    }

    pub fn mappings(&self, config: &ConnectionConfig) -> Mappings {
        (self.mappings)(config)
    }

    /// Body of the partition creation request.
    pub fn create_body(&self, config: &ConnectionConfig) -> Value {
        json!({
            "settings": self.settings(config).to_json(),
            "mappings": self.mappings(config).to_json(),
        })
    }
}

/// Logical collection name → [`IndexSchema`].
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: HashMap<String, IndexSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, logical_name: impl Into<String>, schema: IndexSchema) {
        self.entries.insert(logical_name.into(), schema);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, logical_name: impl Into<String>, schema: IndexSchema) -> Self {
        self.register(logical_name, schema);
        self
    }

    pub fn get(&self, logical_name: &str) -> Option<&IndexSchema> {
        self.entries.get(logical_name)
    }

    pub fn contains(&self, logical_name: &str) -> bool {
        self.entries.contains_key(logical_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new(["http://localhost:9200"]).with_shards(3, 2)
    }

    #[test]
    fn settings_from_config_and_normalizer() {
        let settings = IndexSettings::from_config(&config())
            .lowercase_normalizer("lowercase")
            .setting("refresh_interval", json!("1s"))
            .to_json();

        assert_eq!(settings["number_of_shards"], 3);
        assert_eq!(settings["number_of_replicas"], 2);
        assert_eq!(settings["refresh_interval"], "1s");
        assert_eq!(
            settings["analysis"]["normalizer"]["lowercase"]["filter"],
            json!(["lowercase"])
        );
    }

    #[test]
    fn mappings_with_lowercase_subfield() {
        let mappings = Mappings::new()
            .field("id", FieldMapping::keyword())
            .field(
                "name",
                FieldMapping::text()
                    .subfield("lowercase", FieldMapping::keyword().normalizer("lowercase")),
            )
            .to_json();

        let props = &mappings["properties"];
        assert_eq!(props["id"]["type"], "keyword");
        assert_eq!(props["name"]["type"], "text");
        assert_eq!(props["name"]["fields"]["lowercase"]["type"], "keyword");
        assert_eq!(
            props["name"]["fields"]["lowercase"]["normalizer"],
            "lowercase"
        );
    }

    #[test]
    fn raw_mappings_pass_through() {
        let raw = json!({"properties": {"title": {"type": "text"}}});
        assert_eq!(Mappings::from_json(raw.clone()).to_json(), raw);
    }

    #[test]
    fn schema_builders_see_connection() {
        let schema = IndexSchema::new(
            |c: &ConnectionConfig| IndexSettings::new().shards(c.shards * 2),
            |_: &ConnectionConfig| Mappings::new().dynamic(false),
        );
        let body = schema.create_body(&config());
        assert_eq!(body["settings"]["number_of_shards"], 6);
        assert_eq!(body["mappings"]["dynamic"], false);
    }

    #[test]
    fn registry_lookup() {
        let registry = SchemaRegistry::new().with("examples", IndexSchema::dynamic());
        assert!(registry.contains("examples"));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }
}
