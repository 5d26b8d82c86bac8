//! A single shard: one tantivy index directory plus its ordinal in the
//! shard sequence (component C, plus the disk-usage probe, component A).

use std::fs;
use std::path::{Path, PathBuf};

use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};

use crate::error::{Error, Result};

/// Writer heap budget per shard. Tantivy requires at least ~15 MB per
/// indexing thread; 50 MB keeps single-threaded commits comfortably under
/// memory pressure without over-allocating for a log-ingest workload.
pub(crate) const WRITER_HEAP_BYTES: usize = 50_000_000;

/// One shard: an open tantivy `Index` plus its `IndexReader`, and
/// (lazily) the `IndexWriter` the ingest loop stages batches against.
pub struct Shard {
    /// On-disk directory, or empty for the in-memory sentinel shard.
    pub path: PathBuf,
    /// Position in the shard sequence; `0` is the oldest.
    pub ordinal: u32,
    /// The open engine index.
    pub index: Index,
    /// Reader kept open for the lifetime of the shard; reload policy keeps
    /// it visible to new commits without an explicit `reader.reload()`.
    pub reader: IndexReader,
    /// Present only while a batch is being accumulated; `None` right after
    /// a flush until the next insert/delete arrives.
    pub writer: Option<IndexWriter>,
}

/// Lightweight, cloneable view of a shard for the search fan-out. Search
/// never touches `IndexWriter`, so it only needs what's safe to share
/// across concurrent callers while the ingest loop keeps mutating shards.
#[derive(Clone)]
pub struct ShardHandle {
    /// Position in the shard sequence.
    pub ordinal: u32,
    /// On-disk directory, or empty for the in-memory sentinel shard.
    pub path: PathBuf,
    /// The open engine index (cheap to clone; internally reference counted).
    pub index: Index,
    /// Reader kept open for the lifetime of the shard.
    pub reader: IndexReader,
}

impl Shard {
    /// Builds the lightweight [`ShardHandle`] view of this shard for the
    /// search alias.
    #[must_use]
    pub fn handle(&self) -> ShardHandle {
        ShardHandle {
            ordinal: self.ordinal,
            path: self.path.clone(),
            index: self.index.clone(),
            reader: self.reader.clone(),
        }
    }

    /// Returns the writer, creating one against `self.index` if this is
    /// the first event since the last flush.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineFailed`] if tantivy refuses to allocate a
    /// writer (for example the shard directory's lock file is held by
    /// another process).
    pub fn writer_mut(&mut self) -> Result<&mut IndexWriter> {
        if self.writer.is_none() {
            let writer = self.index.writer(WRITER_HEAP_BYTES)?;
            self.writer = Some(writer);
        }
        Ok(self.writer.as_mut().expect("just inserted"))
    }

    /// Commits the active writer (if any) and drops it, ending the current
    /// batch's lifetime per spec §4.3.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineFailed`] if the commit itself fails.
    pub fn commit_and_drop_writer(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.commit()?;
        }
        Ok(())
    }
}

/// Opens the shard at `path`, creating a fresh one against `schema` if
/// none exists yet. `path` being empty selects the in-memory sentinel
/// shard used by tests and `IndexerConfig::is_in_memory`.
///
/// # Errors
///
/// Returns [`Error::OpenFailed`] if the directory exists but is not a
/// valid tantivy index, or a fresh index cannot be created there.
pub fn open_shard(path: &Path, ordinal: u32, schema: &Schema) -> Result<Shard> {
    let index = if path.as_os_str().is_empty() {
        Index::create_in_ram(schema.clone())
    } else if path.join("meta.json").exists() {
        Index::open_in_dir(path).map_err(|e| Error::open_failed(path, e))?
    } else {
        fs::create_dir_all(path)?;
        Index::create_in_dir(path, schema.clone()).map_err(|e| Error::open_failed(path, e))?
    };

    let reader = index
        .reader_builder()
        .reload_policy(ReloadPolicy::OnCommitWithDelay)
        .try_into()?;

    Ok(Shard { path: path.to_path_buf(), ordinal, index, reader, writer: None })
}

/// Recursively sums file sizes under `path` (component A). Used by the
/// rotation controller to decide whether the active shard has outgrown
/// `IndexerConfig::rotation_size`.
///
/// # Errors
///
/// Returns the underlying I/O error if any directory along the walk can't
/// be read.
pub fn disk_usage(path: &Path) -> std::io::Result<u64> {
    if path.as_os_str().is_empty() {
        return Ok(0);
    }
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    if meta.is_file() {
        return Ok(meta.len());
    }
    let mut total = 0u64;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_meta = entry.metadata()?;
        if entry_meta.is_dir() {
            total += disk_usage(&entry.path())?;
        } else {
            total += entry_meta.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_schema;

    #[test]
    fn in_memory_shard_opens_without_a_path() {
        let (schema, _fields) = build_schema(&[]);
        let shard = open_shard(Path::new(""), 0, &schema).unwrap();
        assert_eq!(shard.ordinal, 0);
    }

    #[test]
    fn on_disk_shard_creates_then_reopens() {
        let (schema, _fields) = build_schema(&[]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shard");
        {
            let shard = open_shard(&path, 0, &schema).unwrap();
            assert_eq!(shard.ordinal, 0);
        }
        let reopened = open_shard(&path, 0, &schema).unwrap();
        assert_eq!(reopened.ordinal, 0);
    }

    #[test]
    fn disk_usage_sums_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"12345").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("b.txt"), b"1234567890").unwrap();
        assert_eq!(disk_usage(dir.path()).unwrap(), 15);
    }

    #[test]
    fn disk_usage_of_missing_path_is_zero() {
        assert_eq!(disk_usage(Path::new("/nonexistent/shard/path")).unwrap(), 0);
    }
}
