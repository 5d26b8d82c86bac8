//! Search alias and `FindMany` (components G, H).
//!
//! The search path never takes the ingest loop's flush lock: each shard's
//! `IndexReader` is internally thread-safe for concurrent search, so the
//! only coordination needed is over the *list* of shard handles itself,
//! which only grows (on rotation) and only ever shrinks to empty (on
//! `close`/`Resync`/`Truncate` swap-in). A `std::sync::RwLock` guards just
//! that list.

use std::sync::RwLock;

use tantivy::collector::TopDocs;
use tantivy::TantivyDocument;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::codec::{Codec, FacetHit, Hit, SearchEvent};
use crate::schema::SchemaFields;
use crate::shard::ShardHandle;

/// Bounded channel capacity for one `find_many` call's result stream.
const RESULT_CHANNEL_CAPACITY: usize = 256;

/// The composite view search queries run against: a snapshot-able list of
/// every open shard's `(Index, IndexReader)` pair.
#[derive(Default)]
pub struct SearchAlias {
    shards: RwLock<Vec<ShardHandle>>,
}

impl SearchAlias {
    /// An alias with no shards yet.
    #[must_use]
    pub fn new() -> Self {
        Self { shards: RwLock::new(Vec::new()) }
    }

    /// Appends a newly opened or rotated-in shard.
    pub fn push(&self, handle: ShardHandle) {
        self.shards.write().expect("search alias lock poisoned").push(handle);
    }

    /// Replaces the entire shard list, used by `Resync`/`Truncate` to swap
    /// in the rebuilt or renumbered set atomically from the search path's
    /// point of view.
    pub fn replace(&self, handles: Vec<ShardHandle>) {
        *self.shards.write().expect("search alias lock poisoned") = handles;
    }

    /// Drops every shard handle, used by `close()`.
    pub fn clear(&self) {
        self.shards.write().expect("search alias lock poisoned").clear();
    }

    /// A point-in-time copy of the shard list to search against. Cloning a
    /// `ShardHandle` is cheap: `Index` and `IndexReader` are both
    /// internally reference-counted.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ShardHandle> {
        self.shards.read().expect("search alias lock poisoned").clone()
    }

    /// Number of shards currently visible to search.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.read().expect("search alias lock poisoned").len()
    }

    /// True if no shards are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fans `query` out across every shard in `alias`, merges hits by score,
/// and streams decoded results back over a bounded channel in descending
/// score order. `offset`/`limit` apply to the globally merged result, not
/// per shard. Cooperatively honors `cancel`: a cancelled token stops the
/// fan-out before scanning further shards and before decoding further
/// hits, emitting a single [`SearchEvent::Cancelled`] marker so a caller
/// reading the stream can tell a short read apart from one that simply
/// ran out of hits.
///
/// # Errors
///
/// Returns [`crate::error::Error::Cancelled`] if `cancel` is already
/// fired when this is called, or [`crate::error::Error::CodecFailed`] if
/// `codec.build_query` itself fails; per-shard search/decode failures are
/// logged and skipped so one damaged shard doesn't fail the whole query.
pub fn find_many<C>(
    alias: &SearchAlias,
    codec: std::sync::Arc<C>,
    schema: &tantivy::schema::Schema,
    fields: &SchemaFields,
    query: &str,
    offset: usize,
    limit: usize,
    cancel: CancellationToken,
) -> crate::error::Result<mpsc::Receiver<SearchEvent<C::Output>>>
where
    C: Codec + 'static,
{
    if cancel.is_cancelled() {
        return Err(crate::error::Error::Cancelled);
    }

    let engine_query = codec.build_query(schema, fields, query)?;
    let handles = alias.snapshot();
    let fields = *fields;
    let (tx, rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        let per_shard_limit = offset + limit;
        let mut merged: Vec<(f32, Hit)> = Vec::new();

        for handle in &handles {
            if cancel.is_cancelled() {
                let _ = tx.blocking_send(SearchEvent::Cancelled);
                return;
            }
            let searcher = handle.reader.searcher();
            let results = match searcher.search(&*engine_query, &TopDocs::with_limit(per_shard_limit.max(1))) {
                Ok(results) => results,
                Err(err) => {
                    warn!(shard = handle.ordinal, error = %err, "shard search failed, skipping");
                    continue;
                }
            };

            for (score, address) in results {
                let Ok(document) = searcher.doc::<TantivyDocument>(address) else {
                    continue;
                };
                let doc_id = document
                    .get_first(fields.doc_id)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                merged.push((score, Hit { doc_id, score, document }));
            }
        }

        merged.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (_, hit) in merged.into_iter().skip(offset).take(limit) {
            if cancel.is_cancelled() {
                let _ = tx.blocking_send(SearchEvent::Cancelled);
                return;
            }
            match codec.unmarshal(&fields, &hit) {
                Ok(output) => {
                    if tx.blocking_send(SearchEvent::Hit(output)).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "failed to decode hit, skipping"),
            }
        }
    });

    Ok(rx)
}

/// Aggregates facet counts for `facet_field` across every shard in
/// `alias` and streams decoded buckets as `SearchEvent::Facet` on the same
/// kind of channel `find_many` returns, per the redesign note folding
/// facet streaming into one enum.
///
/// # Errors
///
/// Returns [`crate::error::Error::EngineFailed`] if the facet collector
/// can't be built against `facet_field`.
pub fn facet_counts<C>(
    alias: &SearchAlias,
    codec: std::sync::Arc<C>,
    facet_field_name: &str,
    facet_field: tantivy::schema::Field,
) -> crate::error::Result<mpsc::Receiver<SearchEvent<C::Output>>>
where
    C: Codec + 'static,
{
    use tantivy::collector::FacetCollector;
    use tantivy::query::AllQuery;

    let handles = alias.snapshot();
    let facet_field_name = facet_field_name.to_string();
    let (tx, rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);

    let mut collector = FacetCollector::for_field(facet_field_name.clone(), facet_field);
    collector.add_facet("/");

    tokio::task::spawn_blocking(move || {
        let mut totals: std::collections::HashMap<String, u64> = std::collections::HashMap::new();
        for handle in &handles {
            let searcher = handle.reader.searcher();
            let counts = match searcher.search(&AllQuery, &collector) {
                Ok(counts) => counts,
                Err(err) => {
                    warn!(shard = handle.ordinal, error = %err, "facet collection failed, skipping");
                    continue;
                }
            };
            for (facet, count) in counts.get("/") {
                *totals.entry(facet.to_string()).or_insert(0) += count;
            }
        }

        for (value, count) in totals {
            let bucket = FacetHit { field: facet_field_name.clone(), value, count };
            if let Some(output) = codec.unmarshal_facet(&bucket) {
                if tx.blocking_send(SearchEvent::Facet(output)).is_err() {
                    break;
                }
            }
        }
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, FacetHit, Hit};
    use crate::schema::{build_schema, ExtraField, ExtraFieldKind, SchemaFields};
    use crate::shard::open_shard;

    /// A codec that indexes a `host` facet and decodes both hits and facet
    /// buckets as plain strings, used only to exercise the facet/cancel
    /// paths without dragging `JsonCodec`'s JSON plumbing into the test.
    #[derive(Clone, Copy)]
    struct HostFacetCodec {
        facet: tantivy::schema::Field,
    }

    impl Codec for HostFacetCodec {
        type Payload = (String, String);
        type Output = String;

        fn marshal(&self, fields: &SchemaFields, payload: &Self::Payload) -> crate::error::Result<TantivyDocument> {
            let mut doc = TantivyDocument::default();
            doc.add_text(fields.body, &payload.1);
            let facet = tantivy::schema::Facet::from_text(&format!("/{}", payload.0))
                .expect("facet path is well-formed");
            doc.add_facet(self.facet, facet);
            Ok(doc)
        }

        fn unmarshal(&self, _fields: &SchemaFields, hit: &Hit) -> crate::error::Result<Self::Output> {
            Ok(hit.doc_id.clone())
        }

        fn build_query(
            &self,
            _schema: &tantivy::schema::Schema,
            fields: &SchemaFields,
            query: &str,
        ) -> crate::error::Result<Box<dyn tantivy::query::Query>> {
            use tantivy::query::QueryParser;
            use tantivy::tokenizer::TokenizerManager;
            let parser = QueryParser::new(_schema.clone(), vec![fields.body], TokenizerManager::default());
            parser.parse_query(query).map_err(|e| crate::error::Error::CodecFailed(e.to_string()))
        }

        fn unmarshal_facet(&self, facet: &FacetHit) -> Option<Self::Output> {
            Some(format!("{}={}", facet.value, facet.count))
        }
    }

    fn build_one_shard_alias(docs: &[(&str, &str)]) -> (SearchAlias, SchemaFields, tantivy::schema::Field) {
        let extra = vec![ExtraField { name: "host_facet".to_string(), kind: ExtraFieldKind::Facet }];
        let (schema, fields) = build_schema(&extra);
        let facet_field = schema.get_field("host_facet").unwrap();
        let codec = HostFacetCodec { facet: facet_field };

        let mut shard = open_shard(std::path::Path::new(""), 0, &schema).unwrap();
        {
            let writer = shard.writer_mut().unwrap();
            for (host, body) in docs {
                let doc = codec.marshal(&fields, &((*host).to_string(), (*body).to_string())).unwrap();
                writer.add_document(doc).unwrap();
            }
        }
        shard.commit_and_drop_writer().unwrap();
        shard.reader.reload().unwrap();

        let alias = SearchAlias::new();
        alias.push(shard.handle());
        (alias, fields, facet_field)
    }

    #[tokio::test]
    async fn facet_counts_aggregates_buckets_across_one_shard() {
        let (alias, _fields, facet_field) =
            build_one_shard_alias(&[("db-1", "disk full"), ("db-1", "disk ok"), ("db-2", "disk full")]);
        let codec = std::sync::Arc::new(HostFacetCodec { facet: facet_field });

        let mut rx = facet_counts(&alias, codec, "host_facet", facet_field).unwrap();
        let mut buckets = Vec::new();
        while let Some(event) = rx.recv().await {
            if let SearchEvent::Facet(value) = event {
                buckets.push(value);
            }
        }
        assert!(buckets.contains(&"/db-1=2".to_string()));
        assert!(buckets.contains(&"/db-2=1".to_string()));
    }

    #[tokio::test]
    async fn find_many_rejects_an_already_cancelled_token() {
        let (schema, fields) = build_schema(&[]);
        let alias = SearchAlias::new();
        let codec = std::sync::Arc::new(crate::codec::JsonCodec);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = find_many(&alias, codec, &schema, &fields, "anything", 0, 10, cancel).unwrap_err();
        assert!(matches!(err, crate::error::Error::Cancelled));
    }
}
