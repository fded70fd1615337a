//! `docbind collections`: declared collections and whether their indices exist.

use std::sync::Arc;

use anyhow::Result;
use docbind_core::{Provisioner, Transport};
use serde::Serialize;

use crate::config::Config;
use crate::http::HttpTransport;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CollectionStatus {
    pub field: String,
    pub logical_name: String,
    pub index: String,
    pub exists: bool,
}

/// Resolves every configured collection and checks its index. Nothing is
/// created.
pub async fn list_collections(
    config: &Config,
    transport: Arc<dyn Transport>,
) -> Result<Vec<CollectionStatus>> {
    let bindings = config.context_builder().resolve()?;
    let provisioner = Provisioner::new(transport.as_ref(), &config.connection);
    let mut out = Vec::with_capacity(bindings.len());
    for binding in &bindings {
        out.push(CollectionStatus {
            field: binding.field.clone(),
            logical_name: binding.logical_name.clone(),
            index: binding.physical_name.clone(),
            exists: provisioner.exists(binding).await?,
        });
    }
    Ok(out)
}

/// CLI entry point: prints the statuses as JSON.
pub async fn run_collections(config: &Config) -> Result<()> {
    let transport = HttpTransport::open(&config.connection)?;
    let statuses = list_collections(config, transport).await?;
    println!("{}", serde_json::to_string_pretty(&statuses)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use docbind_core::{ConnectionConfig, InMemoryEngine};

    #[tokio::test]
    async fn reports_missing_index_without_creating_it() {
        let engine = Arc::new(InMemoryEngine::new());
        let config = Config {
            connection: ConnectionConfig::new(["http://localhost:9200"]).with_naming("t-", ""),
            collections: [("examples".to_string(), CollectionConfig::default())].into(),
        };
        let statuses = list_collections(&config, engine.clone()).await.unwrap();
        assert_eq!(
            statuses,
            vec![CollectionStatus {
                field: "examples".into(),
                logical_name: "examples".into(),
                index: "t-examples".into(),
                exists: false,
            }]
        );
        assert!(engine.index_names().is_empty());
    }
}
