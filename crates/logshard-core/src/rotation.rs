//! Rotation controller (component F): decides, after every flush, whether
//! the active shard has outgrown `IndexerConfig.rotation_size` and should
//! be succeeded by a fresh one.

use tantivy::schema::Schema;
use tracing::info;

use crate::config::{IndexerConfig, RotationSize};
use crate::error::Result;
use crate::shard::{self, open_shard, Shard};
use crate::shard_set::shard_dir_name;

/// Checks the active shard's on-disk usage and, if it exceeds
/// `config.rotation_size`, opens a fresh shard and appends it to `shards`.
/// A no-op for the in-memory sentinel indexer and for
/// `RotationSize::Disabled`.
///
/// # Errors
///
/// Returns [`crate::error::Error::OpenFailed`] if the new shard can't be
/// created, or an I/O error if disk usage can't be measured.
pub fn maybe_rotate(shards: &mut Vec<Shard>, config: &IndexerConfig, schema: &Schema) -> Result<Option<shard::ShardHandle>> {
    let RotationSize::Bytes(threshold) = config.rotation_size else {
        return Ok(None);
    };
    if config.is_in_memory() {
        return Ok(None);
    }

    let active = shards.last().expect("shard set always has an active shard");
    let usage = shard::disk_usage(&active.path)?;
    if usage <= threshold {
        return Ok(None);
    }

    let next_ordinal = active.ordinal + 1;
    let leaf = config
        .base_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = config.base_path.parent().unwrap_or(&config.base_path);
    let new_path = parent.join(shard_dir_name(&leaf, next_ordinal));

    info!(ordinal = next_ordinal, bytes = usage, threshold, "rotating to a new shard");
    let new_shard = open_shard(&new_path, next_ordinal, schema)?;
    // The just-created shard has no pending batch; its writer is created
    // lazily on its first event like every other shard.
    let handle = new_shard.handle();
    shards.push(new_shard);
    Ok(Some(handle))
}
