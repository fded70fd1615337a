//! Context construction.
//!
//! A [`ContextBuilder`] collects collection declarations. Connecting it
//! validates the connection config, opens the transport, resolves every
//! declaration to a binding and provisions every partition, in that order.
//! The resulting [`Context`] owns the shared transport and hands out typed
//! [`Collection`] handles.
//!
//! ```rust
//! use docbind_core::{ConnectionConfig, ContextBuilder, IndexSchema, SchemaRegistry};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Example { id: String, name: String }
//!
//! let builder = ContextBuilder::new(
//!         ConnectionConfig::new(["http://localhost:9200"]).with_naming("local-", ""),
//!         SchemaRegistry::new().with("examples", IndexSchema::dynamic()),
//!     )
//!     .collection::<Example>("Examples");
//! let bindings = builder.resolve().unwrap();
//! assert_eq!(bindings[0].physical_name, "local-examples");
//! // `builder.connect(HttpTransport::open).await` then provisions and
//! // hands out `Collection<Example>` handles.
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::binding::{self, CollectionBinding, Declaration};
use crate::collection::Collection;
use crate::config::ConnectionConfig;
use crate::engine::Transport;
use crate::error::{Error, Result};
use crate::provision::Provisioner;
use crate::schema::SchemaRegistry;

/// Declarations for a [`Context`], before connecting.
#[derive(Debug)]
pub struct ContextBuilder {
    config: ConnectionConfig,
    registry: SchemaRegistry,
    declarations: Vec<Declaration>,
}

impl ContextBuilder {
    pub fn new(config: ConnectionConfig, registry: SchemaRegistry) -> Self {
        Self {
            config,
            registry,
            declarations: Vec::new(),
        }
    }

    /// Declares a collection of `T` whose logical name is `field` lowercased.
    pub fn collection<T: 'static>(mut self, field: impl Into<String>) -> Self {
        self.declarations.push(Declaration::of::<T>(field, None));
        self
    }

    /// Declares a collection of `T` with an explicit logical name.
    pub fn collection_named<T: 'static>(
        mut self,
        field: impl Into<String>,
        logical_name: impl Into<String>,
    ) -> Self {
        self.declarations
            .push(Declaration::of::<T>(field, Some(logical_name.into())));
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Validates the config and resolves the declarations without any I/O.
    pub fn resolve(&self) -> Result<Vec<CollectionBinding>> {
        self.config.validate()?;
        binding::resolve(&self.config, &self.registry, &self.declarations)
    }

    /// Connects and provisions every declared collection.
    pub async fn connect<F>(self, open: F) -> Result<Context>
    where
        F: FnOnce(&ConnectionConfig) -> Result<Arc<dyn Transport>>,
    {
        self.config.validate()?;
        let transport = open(&self.config)?;
        let bindings = binding::resolve(&self.config, &self.registry, &self.declarations)?;
        {
            let provisioner = Provisioner::new(transport.as_ref(), &self.config);
            for b in &bindings {
                provisioner.ensure_exists(b).await?;
            }
        }
        Ok(Context::new(self.config, transport, bindings))
    }

    /// Thread-blocking [`connect`](Self::connect).
    pub fn connect_blocking<F>(self, open: F) -> Result<Context>
    where
        F: FnOnce(&ConnectionConfig) -> Result<Arc<dyn Transport>>,
    {
        self.config.validate()?;
        let transport = open(&self.config)?;
        let bindings = binding::resolve(&self.config, &self.registry, &self.declarations)?;
        let provisioner = Provisioner::new(transport.as_ref(), &self.config);
        for b in &bindings {
            provisioner.ensure_exists_blocking(b)?;
        }
        Ok(Context::new(self.config, transport, bindings))
    }
}

/// A connected set of collections sharing one transport.
pub struct Context {
    config: Arc<ConnectionConfig>,
    transport: Arc<dyn Transport>,
    bindings: Vec<Arc<CollectionBinding>>,
}

impl Context {
    fn new(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        bindings: Vec<CollectionBinding>,
    ) -> Self {
        debug!(
            transport = transport.name(),
            collections = bindings.len(),
            "context ready"
        );
        Self {
            config: Arc::new(config),
            transport,
            bindings: bindings.into_iter().map(Arc::new).collect(),
        }
    }

    /// Handle for the collection declared under `field`.
    ///
    /// Fails if nothing was declared under `field` or it was declared with a
    /// different document type.
    pub fn collection<T>(&self, field: &str) -> Result<Collection<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let binding = self
            .bindings
            .iter()
            .find(|b| b.field == field)
            .ok_or_else(|| {
                Error::Configuration(format!("no collection declared for field '{}'", field))
            })?;
        self.handle(binding)
    }

    /// Handle for the collection whose logical name is the configured
    /// default collection.
    pub fn default_collection<T>(&self) -> Result<Collection<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let name = &self.config.default_collection;
        let binding = self
            .bindings
            .iter()
            .find(|b| &b.logical_name == name)
            .ok_or_else(|| {
                Error::Configuration(format!("default collection '{}' is not declared", name))
            })?;
        self.handle(binding)
    }

    fn handle<T>(&self, binding: &Arc<CollectionBinding>) -> Result<Collection<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if !binding.holds::<T>() {
            return Err(Error::Configuration(format!(
                "collection '{}' holds {}, not {}",
                binding.field,
                binding.type_name,
                std::any::type_name::<T>()
            )));
        }
        Ok(Collection::new(
            Arc::clone(binding),
            Arc::clone(&self.transport),
            Arc::clone(&self.config),
        ))
    }

    pub fn bindings(&self) -> impl Iterator<Item = &CollectionBinding> {
        self.bindings.iter().map(|b| b.as_ref())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(feature = "memory")]
    use crate::memory::InMemoryEngine;
    use crate::schema::IndexSchema;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Example {
        name: String,
    }

    #[derive(Serialize, Deserialize)]
    struct Person {
        name: String,
    }

    fn builder(config: ConnectionConfig) -> ContextBuilder {
        ContextBuilder::new(
            config,
            SchemaRegistry::new()
                .with("examples", IndexSchema::dynamic())
                .with("staff", IndexSchema::dynamic()),
        )
        .collection::<Example>("Examples")
        .collection_named::<Person>("People", "staff")
    }

    #[cfg(feature = "memory")]
    fn memory(engine: &Arc<InMemoryEngine>) -> impl FnOnce(&ConnectionConfig) -> Result<Arc<dyn Transport>> {
        let engine = Arc::clone(engine);
        move |_| Ok(engine as Arc<dyn Transport>)
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn connect_provisions_every_binding() {
        let engine = Arc::new(InMemoryEngine::new());
        let config = ConnectionConfig::new(["http://localhost:9200"]).with_naming("local-", "-tests");
        let ctx = builder(config).connect(memory(&engine)).await.unwrap();
        assert_eq!(
            engine.index_names(),
            vec!["local-examples-tests".to_string(), "local-staff-tests".to_string()]
        );
        assert_eq!(ctx.bindings().count(), 2);
        assert_eq!(ctx.transport().name(), "memory");
    }

    #[test]
    fn empty_endpoints_fail_before_opening() {
        let mut opened = false;
        let result = builder(ConnectionConfig::new(Vec::<String>::new())).connect_blocking(|_| {
            opened = true;
            Err(Error::connection("unreachable"))
        });
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(!opened);
    }

    #[cfg(feature = "memory")]
    #[test]
    fn handle_type_is_checked() {
        let engine = Arc::new(InMemoryEngine::new());
        let ctx = builder(ConnectionConfig::new(["http://localhost:9200"]))
            .connect_blocking(memory(&engine))
            .unwrap();
        assert!(ctx.collection::<Example>("Examples").is_ok());
        assert!(ctx.collection::<Person>("Examples").is_err());
        assert!(ctx.collection::<Example>("Nope").is_err());
        let people = ctx.collection::<Person>("People").unwrap();
        assert_eq!(people.index(), "staff");
    }

    #[cfg(feature = "memory")]
    #[test]
    fn default_collection_by_logical_name() {
        let engine = Arc::new(InMemoryEngine::new());
        let config = ConnectionConfig::new(["http://localhost:9200"]).with_default_collection("staff");
        let ctx = builder(config).connect_blocking(memory(&engine)).unwrap();
        assert_eq!(ctx.default_collection::<Person>().unwrap().index(), "staff");
    }

    #[test]
    fn resolve_without_connecting() {
        let bindings = builder(ConnectionConfig::new(["http://localhost:9200"]))
            .resolve()
            .unwrap();
        assert_eq!(bindings[1].logical_name, "staff");
        assert_eq!(bindings[1].field, "People");
    }
}
