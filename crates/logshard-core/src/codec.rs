//! The `Codec` contract: the one seam between `logshard-core` and whatever
//! typed record a caller wants indexed.
//!
//! `logshard-core` never looks inside a caller's payload type. Every
//! translation between "caller's typed record" and "tantivy document on
//! disk" goes through a `Codec` implementation, mirroring the external
//! interface spec §3/§6 describes and the teacher's own pattern of keeping
//! engine-facing code ignorant of collection-specific point payloads.

use tantivy::query::Query;
use tantivy::TantivyDocument;

use crate::error::Result;
use crate::schema::{ExtraField, SchemaFields};

/// One decoded search hit, still in engine form: the stored document plus
/// its score and resolved `doc_id`.
#[derive(Debug, Clone)]
pub struct Hit {
    /// Stable identifier recorded at insert time.
    pub doc_id: String,
    /// Engine-assigned relevance score (higher is more relevant).
    pub score: f32,
    /// The stored tantivy document, for the codec to pull fields from.
    pub document: TantivyDocument,
}

/// One facet bucket, handed to `Codec::unmarshal_facet` for decoding.
#[derive(Debug, Clone)]
pub struct FacetHit {
    /// Name of the facet field the bucket belongs to.
    pub field: String,
    /// The facet path/value this bucket counts.
    pub value: String,
    /// Number of documents in this bucket, aggregated across every shard.
    pub count: u64,
}

/// A result streamed out of [`crate::search::find_many`]. Facets and hits
/// share one channel; consumers distinguish by matching the variant, per
/// the redesign note in `SPEC_FULL.md` §9.
#[derive(Debug, Clone)]
pub enum SearchEvent<T> {
    /// A decoded document hit.
    Hit(T),
    /// A decoded facet bucket.
    Facet(T),
    /// The query was cancelled before every shard/hit was scanned; hits
    /// already sent on this channel are not retracted.
    Cancelled,
}

/// Translates between a caller's typed record and the engine's document
/// model. One `Codec` implementation is bound to an `Indexer` at a time via
/// `Indexer::set_codec`.
pub trait Codec: Send + Sync {
    /// The type callers hand to `insert_one`.
    type Payload: Send + Sync + 'static;
    /// The type callers receive back from `find_many`.
    type Output: Send + Sync + 'static;

    /// Encodes `payload` into a tantivy document plus the `doc_id` to index
    /// it under. Implementations that want stable upserts should derive
    /// the id from the payload; otherwise the ingest loop mints a fresh
    /// UUIDv4 per spec §4.3/§6.
    fn marshal(&self, fields: &SchemaFields, payload: &Self::Payload) -> Result<TantivyDocument>;

    /// Extracts a stable identifier from `payload`, if the payload type
    /// carries one of its own. Returning `None` tells the ingest loop to
    /// mint a fresh UUIDv4 instead (the `IndexIDProvider` capability from
    /// spec §6).
    fn index_id(&self, _payload: &Self::Payload) -> Option<String> {
        None
    }

    /// Decodes an engine hit back into the caller's output type.
    fn unmarshal(&self, fields: &SchemaFields, hit: &Hit) -> Result<Self::Output>;

    /// Builds the engine query for a caller-supplied query string. Offset
    /// and limit are applied by the search fan-out itself, not by the
    /// returned query. `schema` is the one shared schema every shard of
    /// this indexer was opened with.
    fn build_query(
        &self,
        schema: &tantivy::schema::Schema,
        fields: &SchemaFields,
        query: &str,
    ) -> Result<Box<dyn Query>>;

    /// Extra fields this codec wants registered in every shard's schema,
    /// beyond the three baseline fields. Called once, when an `Indexer`
    /// first opens.
    fn document_mapping(&self) -> Option<Vec<ExtraField>> {
        None
    }

    /// Decodes one facet bucket. Codecs that never request facet fields
    /// can leave this unimplemented; `find_many` simply emits no `Facet`
    /// events in that case.
    fn unmarshal_facet(&self, _facet: &FacetHit) -> Option<Self::Output> {
        None
    }
}

/// A dependency-free default codec: payloads and outputs are raw
/// `serde_json::Value`s, indexed by flattening the JSON into the `_body`
/// text field and storing the original document verbatim in `_payload`.
/// Used by `logshard-cli` and by tests that don't need a bespoke mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Payload = serde_json::Value;
    type Output = serde_json::Value;

    fn marshal(&self, fields: &SchemaFields, payload: &Self::Payload) -> Result<TantivyDocument> {
        let mut doc = TantivyDocument::default();
        let body = flatten_to_text(payload);
        doc.add_text(fields.body, body);
        doc.add_text(fields.payload, payload.to_string());
        Ok(doc)
    }

    fn index_id(&self, payload: &Self::Payload) -> Option<String> {
        payload.get("id").and_then(|v| v.as_str()).map(str::to_string)
    }

    fn unmarshal(&self, fields: &SchemaFields, hit: &Hit) -> Result<Self::Output> {
        let raw = hit
            .document
            .get_first(fields.payload)
            .and_then(|v| v.as_str())
            .unwrap_or("{}");
        let mut value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| crate::error::Error::CodecFailed(e.to_string()))?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("_doc_id".to_string(), serde_json::Value::String(hit.doc_id.clone()));
            obj.insert(
                "_score".to_string(),
                serde_json::Number::from_f64(f64::from(hit.score))
                    .map_or(serde_json::Value::Null, serde_json::Value::Number),
            );
        }
        Ok(value)
    }

    fn build_query(
        &self,
        schema: &tantivy::schema::Schema,
        fields: &SchemaFields,
        query: &str,
    ) -> Result<Box<dyn Query>> {
        use tantivy::query::QueryParser;
        use tantivy::tokenizer::TokenizerManager;

        let parser = QueryParser::new(schema.clone(), vec![fields.body], TokenizerManager::default());
        parser
            .parse_query(query)
            .map_err(|e| crate::error::Error::CodecFailed(e.to_string()))
    }

    fn document_mapping(&self) -> Option<Vec<ExtraField>> {
        None
    }
}

fn flatten_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .values()
            .map(flatten_to_text)
            .collect::<Vec<_>>()
            .join(" "),
        serde_json::Value::Array(items) => {
            items.iter().map(flatten_to_text).collect::<Vec<_>>().join(" ")
        }
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
    }
}
