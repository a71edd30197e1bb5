//! SimpliSearch CLI
//!
//! Prepares the PostgreSQL schema and bulk-indexes text files through the
//! same embedding model and store the HTTP service uses.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use database::postgres::PostgresConfig;
use domain_search::{EmbeddingConfig, OnnxEmbeddingProvider, PgVectorStore, SearchService};
use eyre::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

mod documents;

const MODEL_LAYOUT: &str = "\
The embedding model is read from MODEL_CACHE_DIR (default: models/):
  model.onnx               sentence-transformers model exported to ONNX
  tokenizer.json           Hugging Face tokenizer files of the same model
  config.json
  special_tokens_map.json
  tokenizer_config.json";

#[derive(Parser)]
#[command(name = "simplisearch")]
#[command(about = "SimpliSearch schema setup and bulk indexing")]
#[command(after_help = MODEL_LAYOUT)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector extension, table and index if absent
    SetupDb {
        /// PostgreSQL URL. Defaults to the DB_* environment variables.
        #[arg(long)]
        db_url: Option<String>,
    },

    /// Embed every non-blank line of a file and store it as doc_<line index>
    EmbedAndIndex {
        /// Text file with one document per line
        #[arg(short, long)]
        data_source: PathBuf,

        /// Documents embedded per model call
        #[arg(short, long, default_value_t = 32, value_parser = clap::value_parser!(u16).range(1..))]
        batch_size: u16,

        /// PostgreSQL URL. Defaults to the DB_* environment variables.
        #[arg(long)]
        db_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();
    let embedding = EmbeddingConfig::from_env()?;

    match cli.command {
        Commands::SetupDb { db_url } => {
            let store = open_store(db_url, &embedding).await?;
            store.close().await;
            info!("Database schema is ready");
        }

        Commands::EmbedAndIndex {
            data_source,
            batch_size,
            db_url,
        } => {
            let failed = embed_and_index(&data_source, batch_size.into(), db_url, embedding).await?;
            if failed > 0 {
                warn!(failed, "Some documents could not be indexed");
            }
        }
    }

    Ok(())
}

async fn open_store(db_url: Option<String>, embedding: &EmbeddingConfig) -> Result<PgVectorStore> {
    let database = match db_url {
        Some(url) => PostgresConfig::new(url),
        None => PostgresConfig::from_env()?,
    };

    info!(url = %database.redacted_url(), "Connecting to PostgreSQL");
    PgVectorStore::connect(&database, embedding.dimension)
        .await
        .map_err(|e| eyre::eyre!("Vector store initialization failed: {}", e))
}

/// Returns the number of documents that failed to index.
async fn embed_and_index(
    data_source: &Path,
    batch_size: usize,
    db_url: Option<String>,
    embedding: EmbeddingConfig,
) -> Result<usize> {
    let documents = documents::load(data_source).await?;
    if documents.is_empty() {
        info!(file = %data_source.display(), "No documents to index");
        return Ok(0);
    }

    let store = open_store(db_url, &embedding).await?;

    let embedder = OnnxEmbeddingProvider::new(embedding);
    embedder
        .initialize()
        .map_err(|e| eyre::eyre!("Embedding model initialization failed: {}", e))?;

    let service = SearchService::new(store.clone(), Arc::new(embedder));

    let total = documents.len();
    let batches = total.div_ceil(batch_size);
    let mut indexed = 0;
    let mut failed = 0;

    info!(total, batch_size, "Indexing documents");

    let mut remaining = documents.into_iter();
    for batch_number in 1..=batches {
        let batch: Vec<_> = remaining.by_ref().take(batch_size).collect();
        let outcome = service.ingest_batch(batch).await;

        for (key, error) in &outcome.failed {
            warn!(key = %key, error = %error, "Document skipped");
        }

        indexed += outcome.indexed.len();
        failed += outcome.failed.len();
        info!(
            batch = batch_number,
            batches, indexed, failed, "Batch complete"
        );
    }

    store.close().await;
    info!(indexed, failed, total, "Indexing complete");
    Ok(failed)
}
