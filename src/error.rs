use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReindexError>;

/// Rejected mutation of the metadata model or a bad target path.
///
/// Raised at the call site that supplied the value, before any state changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be negative, got {value}")]
    NegativeValue { field: &'static str, value: i64 },

    #[error("cannot add absolute path to relative file paths, got path: {path:?}")]
    AbsolutePath { path: PathBuf },

    #[error("expected an existing bag directory, got path: {path:?}")]
    NotADirectory { path: PathBuf },
}

/// Canonical error surface for reindexing.
#[derive(Debug, Error)]
pub enum ReindexError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("reindex for storage type {backend} not implemented")]
    UnsupportedBackend { backend: String },

    #[error("storage error in {path:?}: {source}")]
    BackendIo {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failure from an `fs_err` call, whose message already names the path.
    #[error(transparent)]
    Fs(#[from] std::io::Error),

    #[error("invalid config file {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl ReindexError {
    pub(crate) fn backend_io(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        Self::BackendIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for an unknown backend identifier, which callers report instead of treating as a crash.
    #[must_use]
    pub fn is_unsupported_backend(&self) -> bool {
        matches!(self, Self::UnsupportedBackend { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_errors_name_the_path_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("bag_7.db3");

        let err: ReindexError = fs_err::metadata(&missing).unwrap_err().into();
        assert!(matches!(err, ReindexError::Fs(_)));
        let message = err.to_string();
        let needle = missing.display().to_string();
        assert_eq!(message.matches(needle.as_str()).count(), 1, "{message}");
    }

    #[test]
    fn unsupported_backend_is_flagged() {
        let err = ReindexError::UnsupportedBackend {
            backend: "mcap".to_string(),
        };
        assert!(err.is_unsupported_backend());
        assert_eq!(err.to_string(), "reindex for storage type mcap not implemented");
    }
}
