//! Rebuild a bag's `metadata.yaml` from its data files.
//!
//! Flow: pick the backend by storage identifier, list the bag's data files, aggregate each one
//! (in parallel, collected back in file-name order), merge the per-file rows by channel name and
//! write the document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::ReindexConfig;
use crate::error::{ReindexError, Result, ValidationError};
use crate::metadata::{ArchiveMetadata, METADATA_VERSION};
use crate::storage::{BackendRegistry, ChannelRow, FileStats};
use crate::util::has_extension;

/// Metadata computed for a bag, not yet written.
#[derive(Debug, Clone)]
pub struct ReindexPlan {
    pub metadata: ArchiveMetadata,
    /// Sum of the data files' sizes in bytes.
    pub bag_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReindexSummary {
    pub bag_dir: PathBuf,
    /// `None` when nothing was written (dry run).
    pub metadata_path: Option<PathBuf>,
    pub storage_identifier: String,
    pub relative_file_paths: Vec<String>,
    pub channel_count: usize,
    pub message_count: u64,
    pub starting_time_ns: u64,
    pub duration_ns: u64,
    pub bag_size_bytes: u64,
}

impl ReindexPlan {
    pub fn summary(&self, bag_dir: &Path, metadata_path: Option<PathBuf>) -> ReindexSummary {
        let doc = self.metadata.serialize();
        ReindexSummary {
            bag_dir: bag_dir.to_path_buf(),
            metadata_path,
            storage_identifier: doc.information.storage_identifier,
            relative_file_paths: doc.information.relative_file_paths,
            channel_count: doc.information.topics_with_message_count.len(),
            message_count: doc.information.message_count,
            starting_time_ns: doc.information.starting_time.nanoseconds_since_epoch,
            duration_ns: doc.information.duration.nanoseconds,
            bag_size_bytes: self.bag_size,
        }
    }
}

/// Reconstruct `<bag_dir>/metadata.yaml` using the built-in backends.
///
/// An unknown `storage_id` fails with [`ReindexError::UnsupportedBackend`] before the bag
/// directory is touched.
pub fn reindex(
    bag_dir: &Path,
    storage_id: &str,
    serialization_fmt: &str,
    compression_fmt: &str,
    compression_mode: &str,
) -> Result<ReindexSummary> {
    let config = ReindexConfig {
        storage_id: storage_id.to_string(),
        serialization_format: serialization_fmt.to_string(),
        compression_format: compression_fmt.to_string(),
        compression_mode: compression_mode.to_string(),
    };
    reindex_with(&BackendRegistry::default(), bag_dir, &config)
}

pub fn reindex_with(
    registry: &BackendRegistry,
    bag_dir: &Path,
    config: &ReindexConfig,
) -> Result<ReindexSummary> {
    tracing::info!(
        bag = %bag_dir.display(),
        storage = %config.storage_id,
        "beginning reindex"
    );
    let plan = plan_reindex(registry, bag_dir, config)?;
    let metadata_path = plan.metadata.write(bag_dir)?;
    let summary = plan.summary(bag_dir, Some(metadata_path));
    tracing::info!(
        files = summary.relative_file_paths.len(),
        channels = summary.channel_count,
        messages = summary.message_count,
        "reindex completed"
    );
    Ok(summary)
}

/// Compute the metadata for `bag_dir` without writing anything.
pub fn plan_reindex(
    registry: &BackendRegistry,
    bag_dir: &Path,
    config: &ReindexConfig,
) -> Result<ReindexPlan> {
    let aggregator = registry.get(&config.storage_id)?;
    if !bag_dir.is_dir() {
        return Err(ValidationError::NotADirectory {
            path: bag_dir.to_path_buf(),
        }
        .into());
    }

    let files = discover_data_files(bag_dir, aggregator.data_file_extension())?;
    if files.is_empty() {
        tracing::warn!(
            bag = %bag_dir.display(),
            extension = aggregator.data_file_extension(),
            "no data files found"
        );
    }

    let per_file = files
        .par_iter()
        .map(|name| aggregator.aggregate_channel_stats(&bag_dir.join(name)))
        .collect::<Result<Vec<_>>>()?;

    let mut bag_size = 0u64;
    for name in &files {
        bag_size += fs_err::metadata(bag_dir.join(name))?.len();
    }

    let merged = merge_file_stats(&per_file, &config.serialization_format);

    let mut metadata = ArchiveMetadata::new();
    metadata.set_version(i64::from(METADATA_VERSION))?;
    metadata.set_storage_identifier(aggregator.identifier());
    metadata.add_relative_paths(&files)?;
    if let Some((min, max)) = merged.time_bounds() {
        metadata.set_starting_time(min)?;
        metadata.set_duration(max - min)?;
    }
    metadata.set_message_count(merged.message_count())?;
    for row in merged.channels {
        metadata.add_channel(
            row.name,
            row.channel_type,
            row.serialization_format,
            row.offered_profiles,
            row.message_count,
        )?;
    }
    metadata.set_compression_format(config.compression_format.as_str());
    metadata.set_compression_mode(config.compression_mode.as_str());

    Ok(ReindexPlan { metadata, bag_size })
}

/// File names (not paths) of the data files directly inside `bag_dir`, sorted.
///
/// Links count when they resolve to a regular file. Names are kept as the file system spells
/// them so they can be reopened; only the written document sees them as UTF-8.
pub fn discover_data_files(bag_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(bag_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ReindexError::io(bag_dir, e.into()))?;
        if !has_extension(entry.path(), extension) {
            continue;
        }
        if !entry.path().is_file() {
            if entry.path_is_symlink() {
                tracing::warn!(
                    path = %entry.path().display(),
                    "link does not resolve to a data file, skipping"
                );
            }
            continue;
        }
        if entry.file_name().to_str().is_none() {
            tracing::warn!(
                path = %entry.path().display(),
                "data file name is not valid UTF-8, recording it lossily"
            );
        }
        names.push(PathBuf::from(entry.file_name()));
    }
    names.sort();
    Ok(names)
}

/// Merge per-file rows by channel name.
///
/// A split bag repeats each channel in several files: counts are summed, bounds widened, and
/// the first file's descriptor wins. Channels keep first-seen order.
fn merge_file_stats(per_file: &[FileStats], default_serialization: &str) -> FileStats {
    let mut channels: Vec<ChannelRow> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for row in per_file.iter().flat_map(|stats| &stats.channels) {
        match by_name.get(&row.name) {
            Some(&idx) => {
                let merged = &mut channels[idx];
                merged.message_count += row.message_count;
                merged.min_timestamp = merged.min_timestamp.min(row.min_timestamp);
                merged.max_timestamp = merged.max_timestamp.max(row.max_timestamp);
            }
            None => {
                let mut row = row.clone();
                if row.serialization_format.is_empty() {
                    row.serialization_format = default_serialization.to_string();
                }
                by_name.insert(row.name.clone(), channels.len());
                channels.push(row);
            }
        }
    }

    FileStats::from_rows(channels)
}
