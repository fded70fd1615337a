//! `docbind search`: prefix, exact-phrase or wildcard search over a
//! collection.

use std::sync::Arc;

use anyhow::{bail, Result};
use docbind_core::{Field, SearchResult, Sort, Transport};
use serde::Serialize;
use serde_json::Value;

use crate::config::{Config, RawDocument};
use crate::http::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Any field starts with the text.
    StartsWith,
    /// Any field contains the text as a whole phrase.
    Exact,
    /// The single field matches a `*`/`?` pattern.
    Wildcard,
}

#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub collection: Option<String>,
    pub mode: SearchMode,
    pub text: String,
    pub fields: Vec<String>,
    pub skip: u64,
    pub take: u64,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub total: u64,
    pub documents: Vec<Value>,
}

impl From<SearchResult<Value>> for SearchOutput {
    fn from(result: SearchResult<Value>) -> Self {
        Self {
            total: result.total,
            documents: result.documents,
        }
    }
}

pub async fn search_collection(
    config: &Config,
    transport: Arc<dyn Transport>,
    args: &SearchArgs,
) -> Result<SearchOutput> {
    let sort = match &args.sort {
        Some(spec) => match Sort::parse(spec) {
            Some(sort) => Some(sort),
            None => bail!("Invalid sort '{}'. Use field, field:asc or field:desc.", spec),
        },
        None => None,
    };
    let fields: Vec<Field> = args.fields.iter().map(|f| Field::new(f.as_str())).collect();
    if args.mode == SearchMode::Wildcard && fields.len() != 1 {
        bail!("Wildcard search takes exactly one --field");
    }

    let field = config.resolve_field(args.collection.as_deref())?;
    let context = config
        .context_builder()
        .connect(move |_| Ok(transport))
        .await?;
    let collection = context.collection::<RawDocument>(&field)?;

    let result = match args.mode {
        SearchMode::StartsWith => {
            collection
                .search_starts_with(&args.text, args.skip, args.take, sort, &fields)
                .await?
        }
        SearchMode::Exact => {
            collection
                .search_exact_match(&args.text, args.skip, args.take, sort, &fields)
                .await?
        }
        SearchMode::Wildcard => {
            collection
                .search_wildcard(&args.text, args.skip, args.take, sort, &fields[0])
                .await?
        }
    };
    Ok(result.into())
}

pub async fn run_search(config: &Config, args: &SearchArgs) -> Result<()> {
    let transport = HttpTransport::open(&config.connection)?;
    let output = search_collection(config, transport, args).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
