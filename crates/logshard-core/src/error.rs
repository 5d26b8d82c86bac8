//! Error types for `logshard-core`.
//!
//! One unified error type covers every failure kind an [`crate::Indexer`] can
//! surface, matching the propagation policy in the design: most ingest-path
//! failures are logged and swallowed, while maintenance and query-path
//! failures are returned to the caller.

use thiserror::Error;

/// Result type alias for `logshard-core` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by an [`crate::Indexer`].
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid constructor or call argument: bad rotation size, empty or
    /// non-string delete query, and similar caller mistakes.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A shard could neither be opened nor freshly created.
    #[error("failed to open shard at {path}: {source}")]
    OpenFailed {
        /// Path of the shard that failed to open.
        path: std::path::PathBuf,
        /// Underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Directory enumeration, rename, remove, or disk-usage traversal failed.
    #[error("I/O failure: {0}")]
    IoFailed(#[from] std::io::Error),

    /// The search/indexing engine itself failed (commit, search, schema).
    #[error("engine failure: {0}")]
    EngineFailed(String),

    /// A codec `marshal`/`unmarshal`/`build_query` call failed.
    #[error("codec failure: {0}")]
    CodecFailed(String),

    /// The caller's cancellation signal fired before completion.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for [`Error::OpenFailed`] wrapping an arbitrary cause.
    pub fn open_failed<E>(path: impl Into<std::path::PathBuf>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::OpenFailed {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Returns true for errors that only affected a single ingest event and
    /// do not indicate the indexer itself is unusable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::OpenFailed { .. })
    }
}

impl From<tantivy::TantivyError> for Error {
    fn from(err: tantivy::TantivyError) -> Self {
        Self::EngineFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_displays_message() {
        let err = Error::BadRequest("rotation size too small".into());
        assert_eq!(err.to_string(), "bad request: rotation size too small");
    }

    #[test]
    fn io_failed_wraps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoFailed(_)));
    }

    #[test]
    fn open_failed_is_not_recoverable() {
        let err = Error::open_failed(
            "/tmp/shard",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(!err.is_recoverable());
    }
}
