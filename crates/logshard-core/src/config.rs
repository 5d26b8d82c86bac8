//! Logshard configuration.
//!
//! Provides configuration file support via `logshard.toml`, environment
//! variables, and programmatic overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (constructor arguments)
//! 2. Environment variables (`LOGSHARD_*`)
//! 3. Configuration file (`logshard.toml`)
//! 4. Default values

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Size of the caller-facing insert/delete channel (unless `sync_submit`
/// forces an unbuffered, blocking channel for deterministic tests).
pub const BUFFERED_CHAN_SIZE: usize = 10_000;

/// Smallest non-disabled rotation threshold: 68 KiB.
pub const MIN_ROTATION_SIZE: u64 = 68 * 1024;

/// Number of pending batch entries that forces a synchronous flush.
pub const BATCH_FLUSH_THRESHOLD: usize = 5_000;

/// How long the ingest loop waits, selection to selection, before treating
/// itself as idle and flushing any pending batch.
pub const IDLE_FLUSH_INTERVAL: Duration = Duration::from_secs(3);

/// Page size used by `Resync`'s `MatchAll` pagination.
pub const MATCH_ALL_PAGE_SIZE: usize = 5_000;

/// Page size used by `DeleteMany`'s repeated search-and-delete loop.
pub const DELETE_MANY_PAGE_SIZE: usize = 1_000;

/// Rotation threshold for the active shard.
///
/// Replaces the original `-1`-sentinel integer with an explicit variant,
/// per the redesign note in the spec: a magic sentinel value is a poor fit
/// for a typed configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationSize {
    /// Shards never rotate; the active shard grows without bound.
    Disabled,
    /// Rotate once the active shard's on-disk usage exceeds this many bytes.
    Bytes(u64),
}

impl RotationSize {
    fn validate(self) -> Result<()> {
        match self {
            Self::Disabled => Ok(()),
            Self::Bytes(n) if n >= MIN_ROTATION_SIZE => Ok(()),
            Self::Bytes(n) => Err(Error::BadRequest(format!(
                "rotation_size {n} is below the minimum of {MIN_ROTATION_SIZE} bytes"
            ))),
        }
    }
}

impl Default for RotationSize {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Configuration for a single [`crate::Indexer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Directory the active shard (and its rotated siblings) live under.
    /// An empty path selects the in-memory shard used by unit tests.
    pub base_path: PathBuf,
    /// Name the document mapping is registered under when a shard is
    /// freshly created.
    pub mapping_name: String,
    /// Rotation threshold; see [`RotationSize`].
    pub rotation_size: RotationSize,
    /// Capacity of the insert/delete/flush channels in production mode.
    pub buffered_chan_size: usize,
    /// When true, `insert_one`/`delete_one` block on an unbuffered channel
    /// instead of dropping under backpressure. Replaces the process-global
    /// `UnitTestEnv` flag with a per-instance construction option so tests
    /// in one process don't affect indexers in another.
    pub sync_submit: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::new(),
            mapping_name: "default".to_string(),
            rotation_size: RotationSize::Disabled,
            buffered_chan_size: BUFFERED_CHAN_SIZE,
            sync_submit: false,
        }
    }
}

impl IndexerConfig {
    /// Builds a config for an on-disk indexer rooted at `base_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if `rotation_size` is a non-disabled
    /// value below [`MIN_ROTATION_SIZE`].
    pub fn new(
        base_path: impl Into<PathBuf>,
        mapping_name: impl Into<String>,
        rotation_size: RotationSize,
    ) -> Result<Self> {
        let config = Self {
            base_path: base_path.into(),
            mapping_name: mapping_name.into(),
            rotation_size,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `logshard.toml` plus `LOGSHARD_`-prefixed
    /// environment variables, layered over [`IndexerConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if parsing or validation fails.
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("LOGSHARD_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::BadRequest(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants not expressible in the type alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] for an out-of-range rotation size or a
    /// zero channel capacity.
    pub fn validate(&self) -> Result<()> {
        self.rotation_size.validate()?;
        if self.buffered_chan_size == 0 {
            return Err(Error::BadRequest(
                "buffered_chan_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// True when `base_path` selects the in-memory shard used by tests.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.base_path.as_os_str().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_size_below_minimum_is_rejected() {
        let err = IndexerConfig::new("/tmp/logs", "log", RotationSize::Bytes(MIN_ROTATION_SIZE - 1))
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn rotation_size_at_minimum_is_accepted() {
        let config =
            IndexerConfig::new("/tmp/logs", "log", RotationSize::Bytes(MIN_ROTATION_SIZE)).unwrap();
        assert_eq!(config.rotation_size, RotationSize::Bytes(MIN_ROTATION_SIZE));
    }

    #[test]
    fn rotation_disabled_always_valid() {
        IndexerConfig::new("/tmp/logs", "log", RotationSize::Disabled).unwrap();
    }

    #[test]
    fn zero_buffered_chan_size_is_rejected() {
        let mut config = IndexerConfig::default();
        config.buffered_chan_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_base_path_is_in_memory() {
        let config = IndexerConfig::default();
        assert!(config.is_in_memory());
    }

    #[test]
    fn load_from_path_falls_back_to_defaults_on_missing_file() {
        let config = IndexerConfig::load_from_path("/nonexistent/logshard.toml").unwrap();
        assert_eq!(config.mapping_name, "default");
    }
}
