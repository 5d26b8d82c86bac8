//! Ingest loop (component E): the single task that owns every shard's
//! `IndexWriter` and is the only place writes happen.
//!
//! Producers (`Indexer::insert_one`/`delete_one`) only ever touch channel
//! senders; this loop is the sole consumer, so the batch accumulator needs
//! no locking of its own — the "flush lock" in spec §4.3 is realized here
//! as plain task-local state rather than a `Mutex` nobody else contends
//! for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tantivy::schema::Schema;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{error, warn};
use uuid::Uuid;

use crate::batch::Batch;
use crate::codec::Codec;
use crate::config::{IndexerConfig, IDLE_FLUSH_INTERVAL};
use crate::error::Result;
use crate::rotation::maybe_rotate;
use crate::schema::SchemaFields;
use crate::search::SearchAlias;
use crate::shard::Shard;

/// One pending insert: the caller's payload plus an optional
/// caller-provided id, used when a codec has no `index_id` of its own.
pub struct InsertRequest<P> {
    /// The payload to marshal and index.
    pub payload: P,
}

/// Channel senders and lifecycle handle for one `Indexer`'s ingest loop.
pub struct IngestHandle<C: Codec> {
    /// Non-blocking (or blocking, under `sync_submit`) insert channel.
    pub insert_tx: mpsc::Sender<InsertRequest<C::Payload>>,
    /// Delete-by-id channel.
    pub delete_tx: mpsc::Sender<String>,
    /// Capacity-1 explicit flush request channel. The `oneshot` fires once
    /// the flush (and any rotation it triggers) has actually completed, so
    /// `Indexer::flush` can await real completion instead of just handing
    /// off a signal.
    pub flush_tx: mpsc::Sender<oneshot::Sender<()>>,
    /// Signaled once to ask the loop to flush and exit.
    pub shutdown: Arc<Notify>,
    /// Joined by `close()` so callers observe the loop having actually
    /// exited, replacing the fixed 5s quiesce sleep the spec flags in §9.
    pub join: JoinHandle<()>,
    /// Count of inserts/deletes dropped because the channel was full and
    /// `sync_submit` was not set.
    pub dropped_count: Arc<AtomicU64>,
}

/// Starts the ingest loop for one indexer and returns the handle
/// `Indexer::open` stores. `shards` must contain at least the active
/// shard; `alias` must already have every shard's handle pushed.
pub fn spawn<C>(
    codec: Arc<C>,
    mut shards: Vec<Shard>,
    alias: Arc<SearchAlias>,
    config: IndexerConfig,
    schema: Schema,
    fields: SchemaFields,
) -> IngestHandle<C>
where
    C: Codec + 'static,
{
    let chan_size = if config.sync_submit { 0 } else { config.buffered_chan_size };
    let (insert_tx, mut insert_rx) = mpsc::channel(chan_size.max(1));
    let (delete_tx, mut delete_rx) = mpsc::channel(chan_size.max(1));
    let (flush_tx, mut flush_rx) = mpsc::channel::<oneshot::Sender<()>>(1);
    let shutdown = Arc::new(Notify::new());
    let shutdown_loop = shutdown.clone();
    let dropped_count = Arc::new(AtomicU64::new(0));

    let join = tokio::spawn(async move {
        let mut batch = Batch::new();
        let mut ticker = tokio::time::interval(IDLE_FLUSH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = shutdown_loop.notified() => {
                    if let Err(err) = flush(&mut shards, &mut batch, &alias, &config, &schema) {
                        error!(error = %err, "final flush on shutdown failed");
                    }
                    break;
                }

                Some(ack) = flush_rx.recv() => {
                    if let Err(err) = flush(&mut shards, &mut batch, &alias, &config, &schema) {
                        error!(error = %err, "explicit flush failed");
                    }
                    let _ = ack.send(());
                }

                Some(request) = insert_rx.recv() => {
                    apply_insert(&codec, &fields, &mut shards, &mut batch, request.payload);
                    if batch.exceeds_threshold() {
                        if let Err(err) = flush(&mut shards, &mut batch, &alias, &config, &schema) {
                            error!(error = %err, "threshold flush failed");
                        }
                    }
                }

                Some(doc_id) = delete_rx.recv() => {
                    apply_delete(&fields, &mut shards, &mut batch, &doc_id);
                    if batch.exceeds_threshold() {
                        if let Err(err) = flush(&mut shards, &mut batch, &alias, &config, &schema) {
                            error!(error = %err, "threshold flush failed");
                        }
                    }
                }

                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        if let Err(err) = flush(&mut shards, &mut batch, &alias, &config, &schema) {
                            error!(error = %err, "idle flush failed");
                        }
                    }
                }
            }
        }
    });

    IngestHandle { insert_tx, delete_tx, flush_tx, shutdown, join, dropped_count }
}

fn apply_insert<C: Codec>(
    codec: &C,
    fields: &SchemaFields,
    shards: &mut [Shard],
    batch: &mut Batch,
    payload: C::Payload,
) {
    let doc_id = codec.index_id(&payload).unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut document = match codec.marshal(fields, &payload) {
        Ok(document) => document,
        Err(err) => {
            warn!(error = %err, "marshal failed, dropping insert");
            return;
        }
    };
    document.add_text(fields.doc_id, &doc_id);

    let shard = shards.last_mut().expect("ingest loop always has an active shard");
    let writer = match shard.writer_mut() {
        Ok(writer) => writer,
        Err(err) => {
            error!(error = %err, "could not obtain shard writer, dropping insert");
            return;
        }
    };
    if let Err(err) = batch.record_upsert(writer, fields.doc_id, &doc_id, document) {
        error!(error = %err, "failed to stage insert, dropping");
    }
}

fn apply_delete(fields: &SchemaFields, shards: &mut [Shard], batch: &mut Batch, doc_id: &str) {
    let shard = shards.last_mut().expect("ingest loop always has an active shard");
    match shard.writer_mut() {
        Ok(writer) => batch.record_delete(writer, fields.doc_id, doc_id),
        Err(err) => error!(error = %err, "could not obtain shard writer, dropping delete"),
    }
}

/// Commits the active shard's writer, resets the batch, and runs the
/// rotation controller (component F) in sequence, per spec §4.4.
fn flush(
    shards: &mut Vec<Shard>,
    batch: &mut Batch,
    alias: &SearchAlias,
    config: &IndexerConfig,
    schema: &Schema,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    shards.last_mut().expect("active shard").commit_and_drop_writer()?;
    batch.reset();

    if let Some(handle) = maybe_rotate(shards, config, schema)? {
        alias.push(handle);
    }
    Ok(())
}
