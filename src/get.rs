//! `docbind get`: one document by id.

use std::sync::Arc;

use anyhow::Result;
use docbind_core::Transport;
use serde_json::Value;

use crate::config::{Config, RawDocument};
use crate::http::HttpTransport;

/// Fetches a document from the named collection (default collection when
/// `name` is `None`). `Ok(None)` when no document has the id.
pub async fn get_document(
    config: &Config,
    transport: Arc<dyn Transport>,
    name: Option<&str>,
    id: &str,
) -> Result<Option<Value>> {
    let field = config.resolve_field(name)?;
    let context = config
        .context_builder()
        .connect(move |_| Ok(transport))
        .await?;
    let collection = context.collection::<RawDocument>(&field)?;
    Ok(collection.get(id).await?)
}

/// CLI entry point. Exits with status 1 when the document does not exist.
pub async fn run_get(config: &Config, name: Option<&str>, id: &str) -> Result<()> {
    let transport = HttpTransport::open(&config.connection)?;
    match get_document(config, transport, name, id).await? {
        Some(doc) => {
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        None => {
            eprintln!("Error: document not found: {}", id);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use docbind_core::{ConnectionConfig, EngineRequest, InMemoryEngine, Method};
    use serde_json::json;

    #[tokio::test]
    async fn reads_through_the_context() {
        let engine = Arc::new(InMemoryEngine::new());
        engine.handle(
            &EngineRequest::new(Method::Put, ["examples", "_doc", "a"])
                .param("refresh", "true")
                .json(json!({"name": "Example A"})),
        );
        let config = Config {
            connection: ConnectionConfig::new(["http://localhost:9200"])
                .with_default_collection("examples"),
            collections: [("examples".to_string(), CollectionConfig::default())].into(),
        };
        let doc = get_document(&config, engine.clone(), None, "a").await.unwrap();
        assert_eq!(doc, Some(json!({"name": "Example A"})));
        let missing = get_document(&config, engine, Some("examples"), "zz").await.unwrap();
        assert_eq!(missing, None);
    }
}
