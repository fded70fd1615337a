//! Connection configuration consumed when a context is built.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Endpoints, naming and index defaults for one engine connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Engine node URLs, e.g. `["http://localhost:9200"]`. Must be non-empty.
    pub endpoints: Vec<String>,
    #[serde(default = "default_collection")]
    pub default_collection: String,
    #[serde(default = "default_shards")]
    pub shards: u32,
    #[serde(default)]
    pub replicas: u32,
    /// Prepended to every logical collection name.
    #[serde(default)]
    pub name_prefix: String,
    /// Appended to every logical collection name.
    #[serde(default)]
    pub name_suffix: String,
    /// Keep request bodies around so they show up in raw responses and
    /// provisioning diagnostics.
    #[serde(default)]
    pub disable_direct_streaming: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub auth: Option<Auth>,
}

/// Credentials sent with every request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

fn default_collection() -> String {
    "default".to_string()
}
fn default_shards() -> u32 {
    1
}
fn default_request_timeout_secs() -> u64 {
    30
}

impl ConnectionConfig {
    /// Config for the given endpoints with every other field defaulted.
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            default_collection: default_collection(),
            shards: default_shards(),
            replicas: 0,
            name_prefix: String::new(),
            name_suffix: String::new(),
            disable_direct_streaming: false,
            request_timeout_secs: default_request_timeout_secs(),
            auth: None,
        }
    }

    pub fn with_default_collection(mut self, name: impl Into<String>) -> Self {
        self.default_collection = name.into();
        self
    }

    pub fn with_shards(mut self, shards: u32, replicas: u32) -> Self {
        self.shards = shards;
        self.replicas = replicas;
        self
    }

    pub fn with_naming(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self.name_suffix = suffix.into();
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.disable_direct_streaming = enabled;
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Physical partition name for a logical collection name.
    pub fn physical_name(&self, logical_name: &str) -> String {
        format!("{}{}{}", self.name_prefix, logical_name, self.name_suffix)
    }

    /// Checks the invariants a context relies on.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::Configuration(
                "no engine endpoints configured".to_string(),
            ));
        }
        for endpoint in &self.endpoints {
            let trimmed = endpoint.trim();
            if trimmed.is_empty() {
                return Err(Error::Configuration("blank engine endpoint".to_string()));
            }
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                return Err(Error::Configuration(format!(
                    "endpoint '{}' must start with http:// or https://",
                    endpoint
                )));
            }
        }
        if self.shards < 1 {
            return Err(Error::Configuration("shards must be >= 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
