//! Shard directory naming, discovery, and renumbering (component B).
//!
//! Shards live as sibling directories of `base_path`: the oldest is named
//! exactly `base_path`'s leaf, and each later shard is suffixed
//! `.{ordinal:04}` (`log`, `log.0001`, `log.0002`, ...). `list_shards`
//! enumerates them in ordinal order and can renumber a gapped sequence
//! (left behind by a `Truncate`) back to a contiguous `0..n` run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Suffix tantivy directories are given mid-renumber, so a crash between
/// the two rename passes leaves an unambiguous, sweepable leftover.
const RENAME_SUFFIX: &str = "-rename";

/// Formats the directory name for shard `ordinal` under `leaf`.
#[must_use]
pub fn shard_dir_name(leaf: &str, ordinal: u32) -> String {
    if ordinal == 0 {
        leaf.to_string()
    } else {
        format!("{leaf}.{ordinal:04}")
    }
}

/// Parses `entry_name` as a shard of `leaf`, returning its ordinal.
/// Returns `None` for entries that don't belong to this shard sequence.
#[must_use]
pub fn parse_ordinal(entry_name: &str, leaf: &str) -> Option<u32> {
    if entry_name == leaf {
        return Some(0);
    }
    let prefix = format!("{leaf}.");
    let suffix = entry_name.strip_prefix(&prefix)?;
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Removes any directory left over from an interrupted renumber. Called at
/// the start of every `list_shards`, per the redesign note in
/// `SPEC_FULL.md` §9.
///
/// # Errors
///
/// Returns the underlying I/O error if `parent` can't be read or a
/// leftover directory can't be removed.
pub fn sweep_rename_leftovers(parent: &Path) -> std::io::Result<()> {
    if !parent.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(RENAME_SUFFIX) && entry.path().is_dir() {
            fs::remove_dir_all(entry.path())?;
        }
    }
    Ok(())
}

/// Lists the shard directory names under `base_path`'s parent, in ordinal
/// order. Sweeps stale `*-rename` leftovers first. When `rename_if_gapped`
/// is set and the lowest-ordinal entry present isn't ordinal `0` (an
/// earlier shard was truncated away), renumbers the whole sequence down to
/// a contiguous `0..n` run via the two-phase `-rename` dance, then returns
/// the post-renumber names.
///
/// # Errors
///
/// Returns the underlying I/O error from directory enumeration or renames.
pub fn list_shards(base_path: &Path, rename_if_gapped: bool) -> Result<Vec<String>> {
    let parent = base_path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let leaf = base_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    sweep_rename_leftovers(&parent)?;

    if !parent.exists() {
        return Ok(Vec::new());
    }

    let mut entries: Vec<(u32, String)> = fs::read_dir(&parent)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            parse_ordinal(&name, &leaf).map(|ord| (ord, name))
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    if rename_if_gapped {
        if let Some((first_ordinal, _)) = entries.first() {
            if *first_ordinal != 0 {
                entries = renumber(&parent, &leaf, entries)?;
            }
        }
    }

    Ok(entries.into_iter().map(|(_, name)| name).collect())
}

/// Renumbers `entries` (already ordinal-sorted) down to a contiguous
/// `0..n` run using a two-phase rename: every directory first moves to a
/// `-rename`-suffixed temporary name, then back to its final name. This
/// avoids ever colliding with an existing shard's final name mid-renumber.
fn renumber(parent: &Path, leaf: &str, entries: Vec<(u32, String)>) -> Result<Vec<(u32, String)>> {
    let mut temp_names = Vec::with_capacity(entries.len());
    for (_, name) in &entries {
        let temp = format!("{name}{RENAME_SUFFIX}");
        fs::rename(parent.join(name), parent.join(&temp))?;
        temp_names.push(temp);
    }

    let mut renumbered = Vec::with_capacity(temp_names.len());
    for (index, temp) in temp_names.into_iter().enumerate() {
        let ordinal = u32::try_from(index).unwrap_or(u32::MAX);
        let new_name = shard_dir_name(leaf, ordinal);
        fs::rename(parent.join(&temp), parent.join(&new_name))?;
        renumbered.push((ordinal, new_name));
    }
    Ok(renumbered)
}
