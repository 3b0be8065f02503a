//! # bagreindex
//!
//! Rebuilds the `metadata.yaml` index of a rosbag2 bag directory from its data files, for bags
//! whose metadata was lost or corrupted.
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! fn main() -> bagreindex::Result<()> {
//!     let summary = bagreindex::reindex(Path::new("/data/my_bag"), "sqlite3", "cdr", "", "")?;
//!     println!("{} messages in {} files", summary.message_count, summary.relative_file_paths.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod metadata;
pub mod reindex;
pub mod storage;
pub mod util;

pub use config::{ReindexConfig, load_config};
pub use document::{METADATA_FILENAME, MetadataDocument, TOP_LEVEL_KEY};
pub use error::{ReindexError, Result, ValidationError};
pub use metadata::{ArchiveMetadata, ChannelDescriptor, ChannelStats, METADATA_VERSION};
pub use reindex::{
    ReindexPlan, ReindexSummary, discover_data_files, plan_reindex, reindex, reindex_with,
};
pub use storage::{
    Aggregator, BackendRegistry, ChannelRow, FileStats, NO_DATA_MAX_TIMESTAMP,
    NO_DATA_MIN_TIMESTAMP, SqliteAggregator,
};
