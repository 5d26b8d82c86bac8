#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
//! `logshard` CLI - a local operator tool for a rotating full-text log
//! index.
//!
//! Usage:
//!   `logshard insert ./data/log '{"id":"evt-1","msg":"disk full"}'`
//!   `logshard search ./data/log "disk"`
//!   `logshard flush ./data/log`
//!   `logshard resync ./data/log`
//!   `logshard truncate ./data/log --max-bytes 67108864`
//!
//! This is an operator surface over `logshard-core`, not a network
//! service: every subcommand opens the index, performs one operation, and
//! closes it again. No RPC/HTTP transport is implemented here, matching
//! the crate's scope.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use logshard_core::{Indexer, IndexerConfig, JsonCodec, RotationSize, SearchEvent};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "logshard")]
#[command(author, version, about = "Operator CLI for a rotating full-text log index")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inserts one JSON document read from the `document` argument.
    Insert {
        /// Directory the index's shards live under.
        base_path: PathBuf,
        /// JSON document to index, e.g. `{"id":"evt-1","msg":"disk full"}`.
        document: String,
        /// Rotate the active shard once it exceeds this many bytes.
        #[arg(long)]
        rotation_bytes: Option<u64>,
    },
    /// Runs a full-text query and prints matching documents as JSON lines.
    Search {
        /// Directory the index's shards live under.
        base_path: PathBuf,
        /// Query string, passed to the default JSON codec's query parser.
        query: String,
        /// Number of leading hits to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Maximum number of hits to print.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Deletes one document by id.
    Delete {
        /// Directory the index's shards live under.
        base_path: PathBuf,
        /// Id of the document to delete.
        doc_id: String,
    },
    /// Forces a flush of any pending batch.
    Flush {
        /// Directory the index's shards live under.
        base_path: PathBuf,
    },
    /// Rebuilds every shard through the current schema, compacting
    /// segments in the process.
    Resync {
        /// Directory the index's shards live under.
        base_path: PathBuf,
    },
    /// Retains the newest shards within a byte budget and renumbers the
    /// survivors.
    Truncate {
        /// Directory the index's shards live under.
        base_path: PathBuf,
        /// Byte budget for the retained shards.
        #[arg(long)]
        max_bytes: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Insert { base_path, document, rotation_bytes } => {
            let mut indexer = open_indexer(base_path, rotation_bytes)?;
            let payload: serde_json::Value = serde_json::from_str(&document)?;
            indexer.insert_one(payload).await?;
            indexer.flush().await?;
            indexer.close().await?;
        }
        Commands::Search { base_path, query, offset, limit } => {
            let mut indexer = open_indexer(base_path, None)?;
            let mut hits = indexer.find_many(&query, offset, limit, CancellationToken::new())?;
            while let Some(event) = hits.recv().await {
                match event {
                    SearchEvent::Hit(doc) => println!("{doc}"),
                    SearchEvent::Facet(doc) => println!("facet: {doc}"),
                    SearchEvent::Cancelled => {
                        eprintln!("search cancelled before scanning every shard");
                    }
                }
            }
            indexer.close().await?;
        }
        Commands::Delete { base_path, doc_id } => {
            let mut indexer = open_indexer(base_path, None)?;
            indexer.delete_one(doc_id).await?;
            indexer.flush().await?;
            indexer.close().await?;
        }
        Commands::Flush { base_path } => {
            let mut indexer = open_indexer(base_path, None)?;
            indexer.flush().await?;
            indexer.close().await?;
        }
        Commands::Resync { base_path } => {
            let mut indexer = open_indexer(base_path, None)?;
            indexer.resync().await?;
            indexer.close().await?;
        }
        Commands::Truncate { base_path, max_bytes } => {
            let mut indexer = open_indexer(base_path, None)?;
            indexer.truncate(max_bytes).await?;
            indexer.close().await?;
        }
    }

    Ok(())
}

fn open_indexer(
    base_path: PathBuf,
    rotation_bytes: Option<u64>,
) -> anyhow::Result<Indexer<JsonCodec>> {
    let rotation_size = rotation_bytes.map_or(RotationSize::Disabled, RotationSize::Bytes);
    let config = IndexerConfig::new(base_path, "default", rotation_size)?;
    let mut indexer = Indexer::init(config, JsonCodec)?;
    indexer.open()?;
    Ok(indexer)
}
