//! Batch accumulator (component D).
//!
//! Tantivy's `IndexWriter` already buffers added/deleted documents in
//! memory until `commit()`; `Batch` only tracks *how many* operations have
//! been staged since the last flush, so the ingest loop can enforce the
//! 5000-entry threshold from spec §4.3 without asking the engine for an
//! operation count it doesn't expose.

use tantivy::schema::Field;
use tantivy::{IndexWriter, TantivyDocument, Term};

use crate::config::BATCH_FLUSH_THRESHOLD;
use crate::error::Result;

/// Tracks pending operations against one shard's active writer.
#[derive(Debug, Default)]
pub struct Batch {
    pending: usize,
}

impl Batch {
    /// A fresh, empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: 0 }
    }

    /// Stages an upsert: tantivy has no native upsert, so this deletes any
    /// existing document under `doc_id` before adding the new one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::EngineFailed`] if `writer.add_document`
    /// fails (for example a malformed field value).
    pub fn record_upsert(
        &mut self,
        writer: &mut IndexWriter,
        doc_id_field: Field,
        doc_id: &str,
        doc: TantivyDocument,
    ) -> Result<()> {
        writer.delete_term(Term::from_field_text(doc_id_field, doc_id));
        writer.add_document(doc)?;
        self.pending += 1;
        Ok(())
    }

    /// Stages a delete-by-id.
    pub fn record_delete(&mut self, writer: &mut IndexWriter, doc_id_field: Field, doc_id: &str) {
        writer.delete_term(Term::from_field_text(doc_id_field, doc_id));
        self.pending += 1;
    }

    /// Number of operations staged since the last flush.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pending
    }

    /// True if no operations have been staged yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// True once `len()` has crossed [`BATCH_FLUSH_THRESHOLD`], signalling
    /// the ingest loop should flush synchronously rather than wait for the
    /// idle timer.
    #[must_use]
    pub const fn exceeds_threshold(&self) -> bool {
        self.pending > BATCH_FLUSH_THRESHOLD
    }

    /// Resets the counter after a flush.
    pub fn reset(&mut self) {
        self.pending = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_batch_is_empty() {
        let batch = Batch::new();
        assert!(batch.is_empty());
        assert!(!batch.exceeds_threshold());
    }

    #[test]
    fn threshold_trips_past_5000() {
        let mut batch = Batch::new();
        for _ in 0..=BATCH_FLUSH_THRESHOLD {
            batch.pending += 1;
        }
        assert!(batch.exceeds_threshold());
    }

    #[test]
    fn reset_clears_pending_count() {
        let mut batch = Batch::new();
        batch.pending = 42;
        batch.reset();
        assert!(batch.is_empty());
    }
}
