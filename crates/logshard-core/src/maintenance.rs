//! `Resync` and `Truncate` (spec §4.7/§4.8): the two maintenance
//! operations that mutate the shard sequence on disk while the indexer is
//! briefly closed.
//!
//! Both follow the same shape: `close()` (now join-acknowledged rather
//! than slept through, per the §9 redesign decision), mutate shards on
//! disk, then `open()` again to rediscover the resulting sequence.

use std::fs;
use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::AllQuery;
use tantivy::schema::Schema;
use tantivy::{Index, TantivyDocument};
use tracing::info;

use crate::codec::Codec;
use crate::config::MATCH_ALL_PAGE_SIZE;
use crate::error::{Error, Result};
use crate::indexer::Indexer;
use crate::shard::WRITER_HEAP_BYTES;
use crate::shard_set::list_shards;

impl<C> Indexer<C>
where
    C: Codec + 'static,
{
    /// Rebuilds every shard through the indexer's current schema,
    /// compacting each one down to a single fresh segment set in the
    /// process.
    ///
    /// Reindexing here copies each shard's *stored* fields directly into
    /// a freshly created index rather than round-tripping through
    /// `Codec::marshal`/`unmarshal`: those use the caller's `Payload` and
    /// `Output` types respectively, which need not be the same type, so
    /// there is no generic way to turn a decoded `Output` back into a
    /// `Payload` to re-marshal. Copying stored fields still gives callers
    /// a genuine "fresh codec/format" rebuild — it picks up schema
    /// changes (new fields registered since the shard was created) and
    /// compacts segments — without requiring a lossless payload
    /// round-trip the `Codec` trait doesn't promise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpenFailed`] if a shard can't be read, or an I/O
    /// error if the on-disk swap fails partway through.
    pub async fn resync(&mut self) -> Result<()> {
        if self.config().is_in_memory() {
            self.close().await?;
            return self.open();
        }

        self.close().await?;
        let base_path = self.config().base_path.clone();
        let parent = base_path.parent().map_or_else(|| std::path::PathBuf::from("."), Path::to_path_buf);
        let names = list_shards(&base_path, true)?;

        for name in &names {
            let old_path = parent.join(name);
            let tmp_path = parent.join(format!("{name}-resync"));
            if tmp_path.exists() {
                fs::remove_dir_all(&tmp_path)?;
            }
            rebuild_shard(&old_path, &tmp_path, self.schema())?;
            fs::remove_dir_all(&old_path)?;
            fs::rename(&tmp_path, &old_path)?;
            info!(shard = name.as_str(), "resynced shard");
        }

        self.open()
    }

    /// Retains the newest shards whose combined on-disk size fits within
    /// `max_bytes` (always keeping at least the single newest shard, even
    /// if it alone exceeds the budget), deletes the rest, and renumbers
    /// the survivors back to a contiguous `0..n` sequence.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a shard directory can't be measured or
    /// removed.
    pub async fn truncate(&mut self, max_bytes: u64) -> Result<()> {
        if self.config().is_in_memory() {
            return Ok(());
        }

        self.close().await?;
        let base_path = self.config().base_path.clone();
        let parent = base_path.parent().map_or_else(|| std::path::PathBuf::from("."), Path::to_path_buf);
        let names = list_shards(&base_path, false)?;

        let mut kept = Vec::new();
        let mut used = 0u64;
        for name in names.iter().rev() {
            let size = crate::shard::disk_usage(&parent.join(name))?;
            if used + size > max_bytes && !kept.is_empty() {
                break;
            }
            used += size;
            kept.push(name.clone());
        }
        kept.reverse();

        for name in names.iter().filter(|n| !kept.contains(n)) {
            fs::remove_dir_all(parent.join(name))?;
            info!(shard = name.as_str(), "truncated shard");
        }

        // Force the renumber even if nothing was removed, so a gapped
        // sequence left by a prior interrupted truncate still settles.
        list_shards(&base_path, true)?;

        self.open()
    }
}

/// Copies every live (non-deleted) document from `old_path` into a fresh
/// index at `new_path`, built against `schema`.
fn rebuild_shard(old_path: &Path, new_path: &Path, schema: &Schema) -> Result<()> {
    let old_index = Index::open_in_dir(old_path).map_err(|e| Error::open_failed(old_path, e))?;
    let old_reader = old_index.reader()?;
    let searcher = old_reader.searcher();

    fs::create_dir_all(new_path)?;
    let new_index =
        Index::create_in_dir(new_path, schema.clone()).map_err(|e| Error::open_failed(new_path, e))?;
    let mut writer = new_index.writer(WRITER_HEAP_BYTES)?;

    let mut offset = 0usize;
    loop {
        let collector = TopDocs::with_limit(MATCH_ALL_PAGE_SIZE).and_offset(offset);
        let hits = searcher.search(&AllQuery, &collector)?;
        if hits.is_empty() {
            break;
        }
        let page_len = hits.len();
        for (_, address) in hits {
            let doc: TantivyDocument = searcher.doc(address)?;
            writer.add_document(doc)?;
        }
        offset += page_len;
        if page_len < MATCH_ALL_PAGE_SIZE {
            break;
        }
    }
    writer.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::config::IndexerConfig;

    #[tokio::test]
    async fn resync_preserves_documents() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexerConfig::new(dir.path().join("log"), "default", crate::config::RotationSize::Disabled).unwrap();
        let mut indexer = Indexer::init(config, JsonCodec).unwrap();
        indexer.open().unwrap();
        indexer.insert_one(serde_json::json!({"id": "a", "msg": "boot failure"})).await.unwrap();
        indexer.flush().await.unwrap();

        indexer.resync().await.unwrap();

        let mut rx = indexer
            .find_many("boot", 0, 10, tokio_util::sync::CancellationToken::new())
            .unwrap();
        assert!(rx.recv().await.is_some());
        indexer.close().await.unwrap();
    }

    #[tokio::test]
    async fn truncate_always_keeps_the_newest_shard() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexerConfig::new(dir.path().join("log"), "default", crate::config::RotationSize::Disabled).unwrap();
        let mut indexer = Indexer::init(config, JsonCodec).unwrap();
        indexer.open().unwrap();
        indexer.insert_one(serde_json::json!({"id": "a", "msg": "kept"})).await.unwrap();
        indexer.flush().await.unwrap();

        indexer.truncate(1).await.unwrap();

        let mut rx = indexer
            .find_many("kept", 0, 10, tokio_util::sync::CancellationToken::new())
            .unwrap();
        assert!(rx.recv().await.is_some());
        indexer.close().await.unwrap();
    }
}
