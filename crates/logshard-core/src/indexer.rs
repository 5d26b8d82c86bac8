//! The public `Indexer` API (spec §6): `init`/`open`/`close`, insert/delete,
//! `flush`, `find_many`, `set_codec`. Maintenance (`resync`/`truncate`)
//! lives in [`crate::maintenance`] as an `impl` block on the same type.

use std::fs;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tantivy::schema::Schema;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::codec::{Codec, SearchEvent};
use crate::config::IndexerConfig;
use crate::error::{Error, Result};
use crate::ingest::{self, IngestHandle, InsertRequest};
use crate::schema::{build_schema, SchemaFields};
use crate::search::{self, SearchAlias};
use crate::shard::{open_shard, Shard};
use crate::shard_set::list_shards;

/// A rotating, append-mostly full-text index over one family of shards.
///
/// `C` is the caller's [`Codec`], bound for the lifetime of the indexer
/// (use [`Indexer::set_codec`] to swap the live instance without changing
/// its type).
pub struct Indexer<C: Codec> {
    config: IndexerConfig,
    codec: Arc<C>,
    schema: Schema,
    fields: SchemaFields,
    alias: Arc<SearchAlias>,
    ingest: Option<IngestHandle<C>>,
    closed: Arc<AtomicBool>,
}

impl<C> Indexer<C>
where
    C: Codec + 'static,
{
    /// Builds (but does not open) an indexer for `config` using `codec`.
    /// The schema is derived once from `codec.document_mapping()` and
    /// reused by every shard for the indexer's lifetime, per spec §4.2.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if `config` fails validation.
    pub fn init(config: IndexerConfig, codec: C) -> Result<Self> {
        config.validate()?;
        let extra = codec.document_mapping().unwrap_or_default();
        let (schema, fields) = build_schema(&extra);
        Ok(Self {
            config,
            codec: Arc::new(codec),
            schema,
            fields,
            alias: Arc::new(SearchAlias::new()),
            ingest: None,
            closed: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Discovers existing shards under `config.base_path` (creating the
    /// first one if none exist), opens each, and starts the ingest loop.
    /// Idempotent: calling `open` on an already-open indexer is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpenFailed`] if a shard directory exists but isn't
    /// a valid index and can't be recreated.
    pub fn open(&mut self) -> Result<()> {
        if self.ingest.is_some() {
            return Ok(());
        }

        let shards: Vec<Shard> = if self.config.is_in_memory() {
            vec![open_shard(std::path::Path::new(""), 0, &self.schema)?]
        } else {
            let names = list_shards(&self.config.base_path, true)?;
            if names.is_empty() {
                fs::create_dir_all(self.parent_dir())?;
                vec![open_shard(&self.config.base_path, 0, &self.schema)?]
            } else {
                let parent = self.parent_dir();
                names
                    .iter()
                    .enumerate()
                    .map(|(ordinal, name)| {
                        open_shard(&parent.join(name), ordinal as u32, &self.schema)
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };

        self.alias.clear();
        for shard in &shards {
            self.alias.push(shard.handle());
        }
        info!(shards = shards.len(), base_path = %self.config.base_path.display(), "indexer opened");

        self.ingest = Some(ingest::spawn(
            self.codec.clone(),
            shards,
            self.alias.clone(),
            self.config.clone(),
            self.schema.clone(),
            self.fields,
        ));
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Signals the ingest loop to flush and stop, and waits for it to
    /// actually exit. Replaces the original design's fixed 5s quiesce
    /// sleep (spec §9): callers — including `resync`/`truncate` — now
    /// observe real completion instead of guessing a duration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineFailed`] if the ingest task panicked.
    pub async fn close(&mut self) -> Result<()> {
        let Some(handle) = self.ingest.take() else {
            return Ok(());
        };
        handle.shutdown.notify_one();
        handle
            .join
            .await
            .map_err(|e| Error::EngineFailed(format!("ingest task panicked: {e}")))?;
        self.alias.clear();
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Submits one payload for indexing. Non-blocking by default: if the
    /// channel is full the event is dropped and
    /// [`Indexer::dropped_count`] is incremented. When
    /// `IndexerConfig.sync_submit` is set, blocks until the ingest loop
    /// accepts it instead (deterministic ordering for tests).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineFailed`] if the indexer hasn't been opened.
    pub async fn insert_one(&self, payload: C::Payload) -> Result<()> {
        let handle = self.ingest_handle()?;
        let request = InsertRequest { payload };
        if self.config.sync_submit {
            handle
                .insert_tx
                .send(request)
                .await
                .map_err(|_| Error::EngineFailed("ingest loop stopped".to_string()))?;
        } else if handle.insert_tx.try_send(request).is_err() {
            handle.dropped_count.fetch_add(1, Ordering::Relaxed);
            warn!("insert channel full, dropping event");
        }
        Ok(())
    }

    /// Submits one delete-by-id. Same backpressure semantics as
    /// [`Indexer::insert_one`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineFailed`] if the indexer hasn't been opened.
    pub async fn delete_one(&self, doc_id: impl Into<String>) -> Result<()> {
        let handle = self.ingest_handle()?;
        let doc_id = doc_id.into();
        if self.config.sync_submit {
            handle
                .delete_tx
                .send(doc_id)
                .await
                .map_err(|_| Error::EngineFailed("ingest loop stopped".to_string()))?;
        } else if handle.delete_tx.try_send(doc_id).is_err() {
            handle.dropped_count.fetch_add(1, Ordering::Relaxed);
            warn!("delete channel full, dropping event");
        }
        Ok(())
    }

    /// Deletes every document on the **active shard only** matching
    /// `query`, paginating `DELETE_MANY_PAGE_SIZE` hits at a time.
    ///
    /// Preserved verbatim from the original design: older, rotated-away
    /// shards are left untouched by `delete_many`, matching the explicit
    /// open question in spec §4.6/§9 rather than silently changing scope.
    /// Callers who need cross-shard deletes must issue one `delete_many`
    /// per historical shard themselves, or rely on natural rotation/
    /// `truncate` to age old shards out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if `query` is empty or all whitespace,
    /// [`Error::CodecFailed`] if `codec.build_query` fails, or an engine
    /// error if the active shard's writer can't be obtained.
    pub async fn delete_many(&self, query: &str) -> Result<u64> {
        use tantivy::collector::TopDocs;
        use tantivy::TantivyDocument;

        if query.trim().is_empty() {
            return Err(Error::BadRequest("delete_many query must not be empty".to_string()));
        }

        let _handle = self.ingest_handle()?;
        let engine_query = self.codec.build_query(&self.schema, &self.fields, query)?;
        let active = self
            .alias
            .snapshot()
            .into_iter()
            .max_by_key(|h| h.ordinal)
            .ok_or_else(|| Error::EngineFailed("no active shard".to_string()))?;

        let mut deleted = 0u64;
        loop {
            let searcher = active.reader.searcher();
            let hits = searcher.search(
                &*engine_query,
                &TopDocs::with_limit(crate::config::DELETE_MANY_PAGE_SIZE),
            )?;
            if hits.is_empty() {
                break;
            }
            for (_, address) in &hits {
                let Ok(document) = searcher.doc::<TantivyDocument>(*address) else {
                    continue;
                };
                if let Some(doc_id) = document.get_first(self.fields.doc_id).and_then(|v| v.as_str())
                {
                    self.delete_one(doc_id.to_string()).await?;
                    deleted += 1;
                }
            }
            // Commit the page's deletes before re-searching: the active
            // shard's reader only picks up new tombstones after a commit
            // (`ReloadPolicy::OnCommitWithDelay`), so without this the next
            // iteration would re-search the same uncommitted state and see
            // the same hits forever.
            self.flush().await?;
            if hits.len() < crate::config::DELETE_MANY_PAGE_SIZE {
                break;
            }
        }
        Ok(deleted)
    }

    /// Forces a flush of any pending batch and waits for it (and any
    /// rotation it triggers) to complete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineFailed`] if the indexer hasn't been opened or
    /// the ingest loop stopped before acknowledging.
    pub async fn flush(&self) -> Result<()> {
        let handle = self.ingest_handle()?;
        let (ack_tx, ack_rx) = oneshot::channel();
        handle
            .flush_tx
            .send(ack_tx)
            .await
            .map_err(|_| Error::EngineFailed("ingest loop stopped".to_string()))?;
        ack_rx
            .await
            .map_err(|_| Error::EngineFailed("ingest loop stopped before acknowledging".to_string()))
    }

    /// Fans `query` out across every open shard and streams decoded hits
    /// back in descending score order. See [`crate::search::find_many`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodecFailed`] if `codec.build_query` fails.
    pub fn find_many(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
        cancel: CancellationToken,
    ) -> Result<tokio::sync::mpsc::Receiver<SearchEvent<C::Output>>> {
        search::find_many(
            &self.alias,
            self.codec.clone(),
            &self.schema,
            &self.fields,
            query,
            offset,
            limit,
            cancel,
        )
    }

    /// Aggregates facet counts for `facet_field_name` across every open
    /// shard. Only meaningful for a field the codec's
    /// `document_mapping()` registered as
    /// [`crate::schema::ExtraFieldKind::Facet`]; see
    /// [`crate::search::facet_counts`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if `facet_field_name` is not a field
    /// in this indexer's schema.
    pub fn facet_counts(
        &self,
        facet_field_name: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<SearchEvent<C::Output>>> {
        let facet_field = self.schema.get_field(facet_field_name).map_err(|_| {
            Error::BadRequest(format!("unknown facet field: {facet_field_name}"))
        })?;
        search::facet_counts(&self.alias, self.codec.clone(), facet_field_name, facet_field)
    }

    /// Replaces the live codec instance without reopening shards or
    /// changing the schema. The new codec must agree on the same
    /// `Payload`/`Output` types (enforced at compile time by `C`).
    pub fn set_codec(&mut self, codec: C) {
        self.codec = Arc::new(codec);
    }

    /// Number of insert/delete events dropped under backpressure since
    /// this indexer was opened (spec §9's dropped-count metric).
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.ingest.as_ref().map_or(0, |h| h.dropped_count.load(Ordering::Relaxed))
    }

    /// True if `open()` has not been called, or `close()` has.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn fields(&self) -> &SchemaFields {
        &self.fields
    }

    pub(crate) fn config(&self) -> &IndexerConfig {
        &self.config
    }

    fn parent_dir(&self) -> std::path::PathBuf {
        self.config.base_path.parent().map_or_else(
            || std::path::PathBuf::from("."),
            std::path::Path::to_path_buf,
        )
    }

    fn ingest_handle(&self) -> Result<&IngestHandle<C>> {
        self.ingest
            .as_ref()
            .ok_or_else(|| Error::EngineFailed("indexer is not open".to_string()))
    }
}
