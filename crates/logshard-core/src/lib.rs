//! # Logshard Core
//!
//! A rotating, append-mostly full-text index over `tantivy` shards, built
//! for technical/audit log records.
//!
//! An [`Indexer`] owns a sequence of shards rooted at one `base_path`.
//! Writes funnel through a single background ingest loop that batches,
//! flushes on a size/time threshold, and rotates to a fresh shard once the
//! active one outgrows a configured byte budget. Reads (`find_many`) fan
//! out across every open shard concurrently and need no lock beyond the
//! one protecting the shard list itself.
//!
//! Callers bring their own record type by implementing [`Codec`]; see
//! [`JsonCodec`] for a dependency-free default.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use logshard_core::{Indexer, IndexerConfig, JsonCodec, RotationSize, SearchEvent};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = IndexerConfig::new("./data/log", "audit", RotationSize::Bytes(64 * 1024 * 1024))?;
//! let mut indexer = Indexer::init(config, JsonCodec)?;
//! indexer.open()?;
//!
//! indexer.insert_one(serde_json::json!({"id": "evt-1", "msg": "disk full on db-1"})).await?;
//! indexer.flush().await?;
//!
//! let mut hits = indexer.find_many("disk", 0, 10, CancellationToken::new())?;
//! while let Some(event) = hits.recv().await {
//!     if let SearchEvent::Hit(doc) = event {
//!         println!("{doc}");
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod indexer;
pub mod ingest;
pub mod maintenance;
pub mod rotation;
pub mod schema;
pub mod search;
pub mod shard;
pub mod shard_set;

pub use codec::{Codec, FacetHit, Hit, JsonCodec, SearchEvent};
pub use config::{IndexerConfig, RotationSize};
pub use error::{Error, Result};
pub use indexer::Indexer;
pub use schema::{ExtraField, ExtraFieldKind, SchemaFields};
