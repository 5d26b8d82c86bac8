//! Schema construction shared by every shard in an [`crate::Indexer`].
//!
//! A shard's schema is fixed at creation time and must stay identical
//! across rotations, so it is built once (from the codec's optional
//! document mapping) when the `Indexer` opens and reused for every shard
//! `open_shard`/rotation creates afterward.

use tantivy::schema::{Field, Schema, FAST, STORED, STRING, TEXT};

/// Field name carrying the stable document identifier used for
/// upsert-as-delete-then-add and for `DeleteOne`/`DeleteMany` targeting.
pub const DOC_ID_FIELD: &str = "_doc_id";

/// Field name carrying the codec's primary full-text content.
pub const BODY_FIELD: &str = "_body";

/// Field name carrying the codec's round-trippable source payload (the
/// JSON `Marshal` output), stored but not indexed.
pub const PAYLOAD_FIELD: &str = "_payload";

/// Resolved [`tantivy::schema::Field`] handles for the fixed baseline
/// fields every shard carries.
#[derive(Debug, Clone, Copy)]
pub struct SchemaFields {
    /// Stable document identifier field.
    pub doc_id: Field,
    /// Primary searchable text field.
    pub body: Field,
    /// Stored raw payload field, used to reconstruct hits and for `Resync`.
    pub payload: Field,
}

/// An additional field a [`crate::codec::Codec`] wants registered in the
/// shard mapping, beyond the three baseline fields.
#[derive(Debug, Clone)]
pub struct ExtraField {
    /// Field name.
    pub name: String,
    /// How the field should be indexed.
    pub kind: ExtraFieldKind,
}

/// Supported kinds of codec-contributed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraFieldKind {
    /// Tokenized, stored text field.
    Text,
    /// Exact-match (untokenized), stored keyword field.
    Keyword,
    /// Facet field, aggregable via `FindMany`'s facet streaming.
    Facet,
    /// Stored, fast (columnar) numeric field.
    Numeric,
}

/// Builds the schema used by every shard of one `Indexer`, folding in any
/// `extra` fields a codec's `document_mapping()` contributed.
#[must_use]
pub fn build_schema(extra: &[ExtraField]) -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();
    let doc_id = builder.add_text_field(DOC_ID_FIELD, STRING | STORED);
    let body = builder.add_text_field(BODY_FIELD, TEXT | STORED);
    let payload = builder.add_text_field(PAYLOAD_FIELD, STORED);

    for field in extra {
        match field.kind {
            ExtraFieldKind::Text => {
                builder.add_text_field(&field.name, TEXT | STORED);
            }
            ExtraFieldKind::Keyword => {
                builder.add_text_field(&field.name, STRING | STORED);
            }
            ExtraFieldKind::Facet => {
                builder.add_facet_field(&field.name, STORED);
            }
            ExtraFieldKind::Numeric => {
                builder.add_f64_field(&field.name, STORED | FAST);
            }
        }
    }

    let schema = builder.build();
    (schema, SchemaFields { doc_id, body, payload })
}
