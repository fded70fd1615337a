//! `docbind provision` and `docbind drop`.

use std::sync::Arc;

use anyhow::{Context, Result};
use docbind_core::{Provisioner, Transport};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::http::HttpTransport;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProvisionOutcome {
    pub index: String,
    /// `created`, `present`, `deleted` or `absent`.
    pub outcome: &'static str,
}

/// Ensures the index of every configured collection exists.
pub async fn provision_all(
    config: &Config,
    transport: Arc<dyn Transport>,
) -> Result<Vec<ProvisionOutcome>> {
    let bindings = config.context_builder().resolve()?;
    let provisioner = Provisioner::new(transport.as_ref(), &config.connection);
    let mut out = Vec::with_capacity(bindings.len());
    for binding in &bindings {
        let created = provisioner
            .ensure_exists(binding)
            .await
            .with_context(|| format!("Failed to provision collection '{}'", binding.field))?;
        info!(index = %binding.physical_name, created, "provisioned");
        out.push(ProvisionOutcome {
            index: binding.physical_name.clone(),
            outcome: if created { "created" } else { "present" },
        });
    }
    Ok(out)
}

/// Deletes the index of one collection, with all of its documents.
pub async fn drop_collection(
    config: &Config,
    transport: Arc<dyn Transport>,
    name: Option<&str>,
) -> Result<ProvisionOutcome> {
    let field = config.resolve_field(name)?;
    let bindings = config.context_builder().resolve()?;
    let binding = bindings
        .iter()
        .find(|b| b.field == field)
        .ok_or_else(|| anyhow::anyhow!("Unknown collection: '{}'", field))?;
    let deleted = Provisioner::new(transport.as_ref(), &config.connection)
        .drop_if_exists(binding)
        .await?;
    info!(index = %binding.physical_name, deleted, "dropped");
    Ok(ProvisionOutcome {
        index: binding.physical_name.clone(),
        outcome: if deleted { "deleted" } else { "absent" },
    })
}

pub async fn run_provision(config: &Config) -> Result<()> {
    let transport = HttpTransport::open(&config.connection)?;
    let outcomes = provision_all(config, transport).await?;
    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}

pub async fn run_drop(config: &Config, name: Option<&str>) -> Result<()> {
    let transport = HttpTransport::open(&config.connection)?;
    let outcome = drop_collection(config, transport, name).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use docbind_core::{ConnectionConfig, InMemoryEngine};

    fn config() -> Config {
        Config {
            connection: ConnectionConfig::new(["http://localhost:9200"])
                .with_default_collection("examples"),
            collections: [
                ("examples".to_string(), CollectionConfig::default()),
                (
                    "People".to_string(),
                    CollectionConfig {
                        name: Some("staff".into()),
                        ..CollectionConfig::default()
                    },
                ),
            ]
            .into(),
        }
    }

    #[tokio::test]
    async fn provision_then_drop() {
        let engine = Arc::new(InMemoryEngine::new());
        let config = config();

        let first = provision_all(&config, engine.clone()).await.unwrap();
        assert!(first.iter().all(|o| o.outcome == "created"));
        let second = provision_all(&config, engine.clone()).await.unwrap();
        assert!(second.iter().all(|o| o.outcome == "present"));

        let dropped = drop_collection(&config, engine.clone(), Some("staff")).await.unwrap();
        assert_eq!(dropped.index, "staff");
        assert_eq!(dropped.outcome, "deleted");
        let again = drop_collection(&config, engine.clone(), None).await.unwrap();
        assert_eq!(again.outcome, "deleted");
        let absent = drop_collection(&config, engine.clone(), None).await.unwrap();
        assert_eq!(absent.outcome, "absent");
        assert!(engine.index_names().is_empty());
    }
}
