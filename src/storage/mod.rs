//! Storage backends that can recover per-channel statistics from a bag's data files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{ReindexError, Result};

mod sqlite;

pub use sqlite::{SQLITE3_EXTENSION, SQLITE3_IDENTIFIER, SqliteAggregator};

/// `min_timestamp` of a data file that holds no records. Never a real timestamp.
pub const NO_DATA_MIN_TIMESTAMP: i64 = i64::MAX;
/// `max_timestamp` of a data file that holds no records.
pub const NO_DATA_MAX_TIMESTAMP: i64 = 0;

/// One aggregation row: a channel and the records found for it in a single data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRow {
    pub name: String,
    pub channel_type: String,
    pub serialization_format: String,
    pub offered_profiles: String,
    pub message_count: i64,
    pub min_timestamp: i64,
    pub max_timestamp: i64,
}

/// Aggregation result for one data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub channels: Vec<ChannelRow>,
    pub min_timestamp: i64,
    pub max_timestamp: i64,
}

impl Default for FileStats {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            min_timestamp: NO_DATA_MIN_TIMESTAMP,
            max_timestamp: NO_DATA_MAX_TIMESTAMP,
        }
    }
}

impl FileStats {
    /// Collect rows and compute the file-wide time bounds.
    pub fn from_rows(channels: Vec<ChannelRow>) -> Self {
        let mut stats = Self::default();
        for row in &channels {
            stats.min_timestamp = stats.min_timestamp.min(row.min_timestamp);
            stats.max_timestamp = stats.max_timestamp.max(row.max_timestamp);
        }
        stats.channels = channels;
        stats
    }

    pub fn message_count(&self) -> i64 {
        self.channels.iter().map(|c| c.message_count).sum()
    }

    /// `(min, max)` timestamps, or `None` when the sentinels mark a file without records.
    pub fn time_bounds(&self) -> Option<(i64, i64)> {
        if self.channels.is_empty() {
            None
        } else {
            Some((self.min_timestamp, self.max_timestamp))
        }
    }
}

/// A storage backend that can aggregate channel statistics from its data files.
pub trait Aggregator: Send + Sync {
    /// Storage identifier written to `storage_identifier`, e.g. `sqlite3`.
    fn identifier(&self) -> &str;

    /// Extension (without dot) of this backend's data files.
    fn data_file_extension(&self) -> &str;

    /// Open `data_file` read-only and aggregate its records by channel.
    fn aggregate_channel_stats(&self, data_file: &Path) -> Result<FileStats>;
}

/// Backends keyed by storage identifier.
pub struct BackendRegistry {
    backends: BTreeMap<String, Box<dyn Aggregator>>,
}

impl BackendRegistry {
    /// A registry with no backends.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            backends: BTreeMap::new(),
        }
    }

    /// Register `aggregator` under its identifier, returning any backend it replaces.
    pub fn register<A>(&mut self, aggregator: A) -> Option<Box<dyn Aggregator>>
    where
        A: Aggregator + 'static,
    {
        let id = aggregator.identifier().to_string();
        self.backends.insert(id, Box::new(aggregator))
    }

    pub fn get(&self, identifier: &str) -> Result<&dyn Aggregator> {
        self.backends
            .get(identifier)
            .map(|b| &**b)
            .ok_or_else(|| ReindexError::UnsupportedBackend {
                backend: identifier.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Aggregator> {
        self.backends.values().map(|b| &**b)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(SqliteAggregator);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAggregator;

    impl Aggregator for FixedAggregator {
        fn identifier(&self) -> &str {
            "fixed"
        }

        fn data_file_extension(&self) -> &str {
            "fix"
        }

        fn aggregate_channel_stats(&self, _data_file: &Path) -> Result<FileStats> {
            Ok(FileStats::default())
        }
    }

    fn row(name: &str, count: i64, min: i64, max: i64) -> ChannelRow {
        ChannelRow {
            name: name.to_string(),
            channel_type: "pkg/msg/T".to_string(),
            serialization_format: "cdr".to_string(),
            offered_profiles: String::new(),
            message_count: count,
            min_timestamp: min,
            max_timestamp: max,
        }
    }

    #[test]
    fn empty_stats_carry_sentinels() {
        let stats = FileStats::from_rows(Vec::new());
        assert_eq!(stats.min_timestamp, NO_DATA_MIN_TIMESTAMP);
        assert_eq!(stats.max_timestamp, NO_DATA_MAX_TIMESTAMP);
        assert_eq!(stats.time_bounds(), None);
        assert_eq!(stats.message_count(), 0);
    }

    #[test]
    fn bounds_span_all_rows() {
        let stats = FileStats::from_rows(vec![row("/a", 2, 50, 70), row("/b", 3, 10, 60)]);
        assert_eq!(stats.time_bounds(), Some((10, 70)));
        assert_eq!(stats.message_count(), 5);
    }

    #[test]
    fn default_registry_knows_sqlite3_only() {
        let registry = BackendRegistry::default();
        let sqlite = registry.get("sqlite3").unwrap();
        assert_eq!(sqlite.data_file_extension(), "db3");
        assert_eq!(registry.iter().count(), 1);

        let err = registry.get("mcap").err().unwrap();
        assert!(err.is_unsupported_backend());
        assert_eq!(err.to_string(), "reindex for storage type mcap not implemented");
    }

    #[test]
    fn registering_adds_and_replaces_backends() {
        let mut registry = BackendRegistry::empty();
        assert!(registry.get("fixed").is_err());
        assert!(registry.register(FixedAggregator).is_none());
        assert!(registry.register(FixedAggregator).is_some());
        assert_eq!(registry.get("fixed").unwrap().data_file_extension(), "fix");
    }
}
