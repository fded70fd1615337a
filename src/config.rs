//! TOML configuration for the `docbind` binary.
//!
//! ```toml
//! [connection]
//! endpoints = ["http://localhost:9200"]
//! default_collection = "examples"
//! name_prefix = "local-"
//!
//! [collections.examples]
//! settings = { refresh_interval = "1s" }
//! mappings = { properties = { name = { type = "text" } } }
//! ```
//!
//! Each `[collections.<field>]` table declares one collection under the
//! field identifier `<field>`. `name` overrides the logical name,
//! `settings` are merged over the shard/replica defaults, and `mappings`
//! are sent verbatim (dynamic mappings when absent).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use docbind_core::{ConnectionConfig, ContextBuilder, IndexSchema, IndexSettings, Mappings, SchemaRegistry};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CollectionConfig {
    /// Logical name override; defaults to the table key lowercased.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: Option<Value>,
    #[serde(default)]
    pub mappings: Option<Value>,
}

impl CollectionConfig {
    pub fn logical_name(&self, field: &str) -> String {
        self.name.clone().unwrap_or_else(|| field.to_lowercase())
    }

    fn schema(&self) -> IndexSchema {
        let settings = self.settings.clone();
        let mappings = self.mappings.clone();
        IndexSchema::new(
            move |config: &ConnectionConfig| {
                let base = IndexSettings::from_config(config);
                match &settings {
                    Some(extra) => base.merge(extra),
                    None => base,
                }
            },
            move |_: &ConnectionConfig| match &mappings {
                Some(raw) => Mappings::from_json(raw.clone()),
                None => Mappings::new(),
            },
        )
    }
}

/// Untyped documents, as the binary sees them.
pub type RawDocument = Value;

impl Config {
    pub fn schema_registry(&self) -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        for (field, collection) in &self.collections {
            registry.register(collection.logical_name(field), collection.schema());
        }
        registry
    }

    /// A context builder with every configured collection declared.
    pub fn context_builder(&self) -> ContextBuilder {
        let mut builder = ContextBuilder::new(self.connection.clone(), self.schema_registry());
        for (field, collection) in &self.collections {
            builder = match &collection.name {
                Some(name) => builder.collection_named::<RawDocument>(field.as_str(), name.as_str()),
                None => builder.collection::<RawDocument>(field.as_str()),
            };
        }
        builder
    }

    /// Field identifier of the collection named `name`: either a table key
    /// or a logical name. `None` picks the configured default collection.
    pub fn resolve_field(&self, name: Option<&str>) -> Result<String> {
        let wanted = name.unwrap_or(&self.connection.default_collection);
        if self.collections.contains_key(wanted) {
            return Ok(wanted.to_string());
        }
        self.collections
            .iter()
            .find(|(field, c)| c.logical_name(field) == wanted)
            .map(|(field, _)| field.clone())
            .ok_or_else(|| anyhow::anyhow!("Unknown collection: '{}'", wanted))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config
        .connection
        .validate()
        .with_context(|| "Invalid [connection] section")?;

    if config.collections.is_empty() {
        anyhow::bail!("at least one [collections.<name>] table is required");
    }

    for (field, collection) in &config.collections {
        for (key, value) in [("settings", &collection.settings), ("mappings", &collection.mappings)] {
            if let Some(v) = value {
                if !v.is_object() {
                    anyhow::bail!("collections.{}.{} must be a table", field, key);
                }
            }
        }
    }

    // Surfaces duplicate and illegal index names before any I/O.
    config
        .context_builder()
        .resolve()
        .with_context(|| "Invalid [collections] section")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const SAMPLE: &str = r#"
[connection]
endpoints = ["http://localhost:9200"]
default_collection = "examples"
name_prefix = "local-"
name_suffix = "-dev"

[collections.examples]
settings = { refresh_interval = "1s" }
mappings = { properties = { name = { type = "text" } } }

[collections.People]
name = "staff"
"#;

    #[test]
    fn loads_sample() {
        let f = write(SAMPLE);
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.connection.shards, 1);
        assert_eq!(config.connection.request_timeout_secs, 30);
        assert_eq!(config.collections.len(), 2);

        let bindings = config.context_builder().resolve().unwrap();
        let names: Vec<&str> = bindings.iter().map(|b| b.physical_name.as_str()).collect();
        assert_eq!(names, vec!["local-staff-dev", "local-examples-dev"]);
    }

    #[test]
    fn settings_merge_over_defaults() {
        let f = write(SAMPLE);
        let config = load_config(f.path()).unwrap();
        let registry = config.schema_registry();
        let body = registry
            .get("examples")
            .unwrap()
            .create_body(&config.connection);
        assert_eq!(body["settings"]["number_of_shards"], 1);
        assert_eq!(body["settings"]["refresh_interval"], "1s");
        assert_eq!(body["mappings"]["properties"]["name"]["type"], "text");
    }

    #[test]
    fn resolve_field_by_key_or_logical_name() {
        let f = write(SAMPLE);
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.resolve_field(None).unwrap(), "examples");
        assert_eq!(config.resolve_field(Some("staff")).unwrap(), "People");
        assert_eq!(config.resolve_field(Some("People")).unwrap(), "People");
        assert!(config.resolve_field(Some("nope")).is_err());
    }

    #[test]
    fn empty_endpoints_rejected() {
        let f = write("[connection]\nendpoints = []\n\n[collections.examples]\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("no engine endpoints"));
    }

    #[test]
    fn collision_rejected() {
        let f = write(
            "[connection]\nendpoints = [\"http://localhost:9200\"]\n\n[collections.a]\nname = \"same\"\n\n[collections.b]\nname = \"same\"\n",
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn missing_file() {
        let err = load_config(Path::new("/nonexistent/docbind.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
