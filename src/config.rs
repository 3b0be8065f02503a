use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReindexError, Result};
use crate::storage::SQLITE3_IDENTIFIER;

pub const DEFAULT_SERIALIZATION_FORMAT: &str = "cdr";

/// Parameters of one reindex run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexConfig {
    /// Storage backend identifier, e.g. `sqlite3`.
    pub storage_id: String,
    /// Used for channels whose data file does not record a serialization format.
    pub serialization_format: String,
    /// Passed through to the document; empty means uncompressed.
    pub compression_format: String,
    pub compression_mode: String,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            storage_id: SQLITE3_IDENTIFIER.to_string(),
            serialization_format: DEFAULT_SERIALIZATION_FORMAT.to_string(),
            compression_format: String::new(),
            compression_mode: String::new(),
        }
    }
}

/// Load a JSON config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ReindexConfig> {
    match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).map_err(|e| ReindexError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ReindexConfig::default()),
        Err(e) => Err(ReindexError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("reindex.json")).unwrap();
        assert_eq!(config, ReindexConfig::default());
        assert_eq!(config.storage_id, "sqlite3");
        assert_eq!(config.serialization_format, "cdr");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reindex.json");
        std::fs::write(&path, r#"{"compression_format": "zstd", "compression_mode": "file"}"#)
            .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.storage_id, "sqlite3");
        assert_eq!(config.compression_format, "zstd");
        assert_eq!(config.compression_mode, "file");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reindex.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ReindexError::Config { .. }));
    }
}
