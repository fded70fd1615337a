//! # docbind CLI
//!
//! Administrative commands over the collections declared in a docbind
//! configuration file.
//!
//! ```bash
//! docbind --config ./config/docbind.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docbind collections` | List collections, their index names and whether the index exists |
//! | `docbind provision` | Create every missing index |
//! | `docbind drop [collection]` | Delete a collection's index |
//! | `docbind get <id>` | Print one document |
//! | `docbind search --starts-with <text> --field <f>` | Search a collection |
//!
//! Output is JSON on stdout. Commands that take `--collection` default to
//! `connection.default_collection`.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use docbind::search::{SearchArgs, SearchMode};
use docbind::{collections, config, get, logging, provision, search};

#[derive(Parser)]
#[command(
    name = "docbind",
    about = "Typed collections over an Elasticsearch-compatible engine",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docbind.toml")]
    config: PathBuf,

    /// Log level for docbind output on stderr; `RUST_LOG` overrides it.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured collections and whether their indices exist.
    Collections,

    /// Create the index of every configured collection that lacks one.
    ///
    /// Safe to run repeatedly.
    Provision,

    /// Delete a collection's index and every document in it.
    Drop {
        /// Collection (table key or logical name).
        collection: Option<String>,
    },

    /// Print a document by id.
    Get {
        id: String,

        #[arg(long, short)]
        collection: Option<String>,
    },

    /// Search a collection.
    #[command(group(
        ArgGroup::new("mode")
            .required(true)
            .args(["starts_with", "exact", "wildcard"])
    ))]
    Search {
        /// Any field starts with this text.
        #[arg(long)]
        starts_with: Option<String>,

        /// Any field contains this text as a whole phrase.
        #[arg(long)]
        exact: Option<String>,

        /// The field matches this `*`/`?` pattern.
        #[arg(long)]
        wildcard: Option<String>,

        /// Field to match; repeat for several.
        #[arg(long = "field", required = true)]
        fields: Vec<String>,

        #[arg(long, short)]
        collection: Option<String>,

        #[arg(long, default_value_t = 0)]
        skip: u64,

        #[arg(long, default_value_t = 10)]
        take: u64,

        /// `field`, `field:asc` or `field:desc`.
        #[arg(long)]
        sort: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Collections => {
            collections::run_collections(&cfg).await?;
        }
        Commands::Provision => {
            provision::run_provision(&cfg).await?;
        }
        Commands::Drop { collection } => {
            provision::run_drop(&cfg, collection.as_deref()).await?;
        }
        Commands::Get { id, collection } => {
            get::run_get(&cfg, collection.as_deref(), &id).await?;
        }
        Commands::Search {
            starts_with,
            exact,
            wildcard,
            fields,
            collection,
            skip,
            take,
            sort,
        } => {
            let (mode, text) = match (starts_with, exact, wildcard) {
                (Some(t), _, _) => (SearchMode::StartsWith, t),
                (_, Some(t), _) => (SearchMode::Exact, t),
                (_, _, Some(t)) => (SearchMode::Wildcard, t),
                (None, None, None) => anyhow::bail!("one of --starts-with, --exact or --wildcard is required"),
            };
            let args = SearchArgs {
                collection,
                mode,
                text,
                fields,
                skip,
                take,
                sort,
            };
            search::run_search(&cfg, &args).await?;
        }
    }

    Ok(())
}
