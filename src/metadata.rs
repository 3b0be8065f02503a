//! In-memory model of a bag's metadata document.
//!
//! Every mutation validates its input on the spot; a rejected call leaves the model untouched.
//! A fresh [`ArchiveMetadata`] is built per reindex, filled from aggregation results, and
//! written once.

use std::io::Write;
use std::path::{Path, PathBuf};

use atomic_write_file::AtomicWriteFile;
use serde::{Deserialize, Serialize};

use crate::document::{
    BagfileInformation, Duration, METADATA_FILENAME, MetadataDocument, StartingTime,
    TopicMetadata, TopicWithMessageCount,
};
use crate::error::{ReindexError, Result, ValidationError};

/// Metadata format version written by this crate.
pub const METADATA_VERSION: u32 = 4;

/// Identity of one named channel (topic) in a bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub channel_type: String,
    pub serialization_format: String,
    /// Opaque QoS text, passed through verbatim.
    pub offered_profiles: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub descriptor: ChannelDescriptor,
    pub message_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveMetadata {
    version: u64,
    storage_identifier: String,
    relative_file_paths: Vec<String>,
    duration: u64,
    starting_time: u64,
    message_count: u64,
    channels: Vec<ChannelStats>,
    compression_format: String,
    compression_mode: String,
}

fn non_negative(field: &'static str, value: i64) -> std::result::Result<u64, ValidationError> {
    u64::try_from(value).map_err(|_| ValidationError::NegativeValue { field, value })
}

fn relative_path_string(path: &Path) -> std::result::Result<String, ValidationError> {
    if path.is_absolute() || path.has_root() {
        return Err(ValidationError::AbsolutePath {
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_string_lossy().into_owned())
}

impl ArchiveMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn storage_identifier(&self) -> &str {
        &self.storage_identifier
    }

    /// Paths in insertion order. [`ArchiveMetadata::serialize`] sorts them.
    pub fn relative_file_paths(&self) -> &[String] {
        &self.relative_file_paths
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn starting_time(&self) -> u64 {
        self.starting_time
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn channels(&self) -> &[ChannelStats] {
        &self.channels
    }

    pub fn compression_format(&self) -> &str {
        &self.compression_format
    }

    pub fn compression_mode(&self) -> &str {
        &self.compression_mode
    }

    pub fn set_version(&mut self, version: i64) -> std::result::Result<(), ValidationError> {
        self.version = non_negative("version", version)?;
        Ok(())
    }

    pub fn set_storage_identifier(&mut self, identifier: impl Into<String>) {
        self.storage_identifier = identifier.into();
    }

    pub fn set_duration(&mut self, nanoseconds: i64) -> std::result::Result<(), ValidationError> {
        self.duration = non_negative("duration", nanoseconds)?;
        Ok(())
    }

    pub fn set_starting_time(
        &mut self,
        nanoseconds_since_epoch: i64,
    ) -> std::result::Result<(), ValidationError> {
        self.starting_time = non_negative("starting time", nanoseconds_since_epoch)?;
        Ok(())
    }

    pub fn set_message_count(&mut self, count: i64) -> std::result::Result<(), ValidationError> {
        self.message_count = non_negative("message count", count)?;
        Ok(())
    }

    pub fn set_compression_format(&mut self, format: impl Into<String>) {
        self.compression_format = format.into();
    }

    pub fn set_compression_mode(&mut self, mode: impl Into<String>) {
        self.compression_mode = mode.into();
    }

    pub fn add_relative_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> std::result::Result<(), ValidationError> {
        let path = relative_path_string(path.as_ref())?;
        self.relative_file_paths.push(path);
        Ok(())
    }

    /// Add several paths. Either all of them are added or, on the first absolute path, none.
    pub fn add_relative_paths<I, P>(&mut self, paths: I) -> std::result::Result<(), ValidationError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let validated = paths
            .into_iter()
            .map(|p| relative_path_string(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.relative_file_paths.extend(validated);
        Ok(())
    }

    /// Append a channel entry. Duplicate names are not rejected; merging is the caller's job.
    pub fn add_channel(
        &mut self,
        name: impl Into<String>,
        channel_type: impl Into<String>,
        serialization_format: impl Into<String>,
        offered_profiles: impl Into<String>,
        message_count: i64,
    ) -> std::result::Result<(), ValidationError> {
        let message_count = non_negative("topic message count", message_count)?;
        self.channels.push(ChannelStats {
            descriptor: ChannelDescriptor {
                name: name.into(),
                channel_type: channel_type.into(),
                serialization_format: serialization_format.into(),
                offered_profiles: offered_profiles.into(),
            },
            message_count,
        });
        Ok(())
    }

    /// Build the canonical document: paths sorted, channels in insertion order.
    #[must_use]
    pub fn serialize(&self) -> MetadataDocument {
        let mut relative_file_paths = self.relative_file_paths.clone();
        relative_file_paths.sort();

        let topics_with_message_count = self
            .channels
            .iter()
            .map(|channel| TopicWithMessageCount {
                topic_metadata: TopicMetadata {
                    topic: channel.descriptor.name.clone(),
                    topic_type: channel.descriptor.channel_type.clone(),
                    serialization_format: channel.descriptor.serialization_format.clone(),
                    offered_qos_profiles: channel.descriptor.offered_profiles.clone(),
                },
                message_count: channel.message_count,
            })
            .collect();

        MetadataDocument {
            information: BagfileInformation {
                version: self.version,
                storage_identifier: self.storage_identifier.clone(),
                relative_file_paths,
                duration: Duration {
                    nanoseconds: self.duration,
                },
                starting_time: StartingTime {
                    nanoseconds_since_epoch: self.starting_time,
                },
                message_count: self.message_count,
                topics_with_message_count,
                compression_format: self.compression_format.clone(),
                compression_mode: self.compression_mode.clone(),
            },
        }
    }

    /// Write `metadata.yaml` into `bag_dir`, replacing any existing file.
    ///
    /// The document goes to a temporary file that is renamed into place, so a failure never
    /// leaves a partial document behind.
    pub fn write(&self, bag_dir: &Path) -> Result<PathBuf> {
        if !bag_dir.is_dir() {
            return Err(ValidationError::NotADirectory {
                path: bag_dir.to_path_buf(),
            }
            .into());
        }

        let path = bag_dir.join(METADATA_FILENAME);
        let yaml = self.serialize().to_yaml();

        let mut file = AtomicWriteFile::options()
            .open(&path)
            .map_err(|e| ReindexError::io(&path, e))?;
        file.write_all(yaml.as_bytes())
            .map_err(|e| ReindexError::io(&path, e))?;
        file.commit().map_err(|e| ReindexError::io(&path, e))?;

        tracing::debug!(path = %path.display(), bytes = yaml.len(), "wrote metadata document");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QOS: &str = "- history: 3\n  depth: 0\n  reliability: 1\n  durability: 2";

    #[test]
    fn numeric_setters_round_trip() {
        let mut meta = ArchiveMetadata::new();
        for n in [0_i64, 1, 7, 151_137_181, i64::MAX] {
            meta.set_message_count(n).unwrap();
            assert_eq!(meta.message_count(), n as u64);
        }
        meta.set_version(4).unwrap();
        meta.set_duration(151_137_181).unwrap();
        meta.set_starting_time(1_586_406_456_763_032_325).unwrap();
        assert_eq!(meta.version(), 4);
        assert_eq!(meta.duration(), 151_137_181);
        assert_eq!(meta.starting_time(), 1_586_406_456_763_032_325);
    }

    #[test]
    fn negative_values_are_rejected_without_mutation() {
        let mut meta = ArchiveMetadata::new();
        meta.set_message_count(7).unwrap();
        for n in [-1_i64, -42, i64::MIN] {
            let err = meta.set_message_count(n).unwrap_err();
            assert_eq!(
                err,
                ValidationError::NegativeValue {
                    field: "message count",
                    value: n
                }
            );
            assert_eq!(meta.message_count(), 7);
        }
        assert!(meta.set_version(-1).is_err());
        assert!(meta.set_duration(-1).is_err());
        assert!(meta.set_starting_time(-1).is_err());
        assert_eq!(meta, {
            let mut expected = ArchiveMetadata::new();
            expected.set_message_count(7).unwrap();
            expected
        });
    }

    #[test]
    fn add_channel_rejects_negative_count() {
        let mut meta = ArchiveMetadata::new();
        let err = meta
            .add_channel("/a", "std_msgs/msg/String", "cdr", "", -3)
            .unwrap_err();
        assert!(matches!(err, ValidationError::NegativeValue { value: -3, .. }));
        assert!(meta.channels().is_empty());
    }

    #[test]
    fn relative_paths_accepted_absolute_rejected() {
        let mut meta = ArchiveMetadata::new();
        meta.add_relative_path("bag_0.db3").unwrap();
        meta.add_relative_path(Path::new("sub").join("bag_1.db3")).unwrap();

        let err = meta.add_relative_path("/tmp/bag_2.db3").unwrap_err();
        assert_eq!(
            err,
            ValidationError::AbsolutePath {
                path: PathBuf::from("/tmp/bag_2.db3")
            }
        );
        assert_eq!(meta.relative_file_paths().len(), 2);
        let doc = meta.serialize();
        assert!(
            doc.information
                .relative_file_paths
                .contains(&"bag_0.db3".to_string())
        );
    }

    #[test]
    fn add_relative_paths_is_all_or_nothing() {
        let mut meta = ArchiveMetadata::new();
        let err = meta
            .add_relative_paths(["a.db3", "/abs/b.db3", "c.db3"])
            .unwrap_err();
        assert!(matches!(err, ValidationError::AbsolutePath { .. }));
        assert!(meta.relative_file_paths().is_empty());

        meta.add_relative_paths(vec![PathBuf::from("a.db3"), PathBuf::from("c.db3")])
            .unwrap();
        assert_eq!(meta.relative_file_paths(), ["a.db3", "c.db3"]);
    }

    #[test]
    fn serialize_sorts_paths_and_keeps_channel_order() {
        let mut meta = ArchiveMetadata::new();
        meta.add_relative_path("b.db3").unwrap();
        meta.add_relative_path("a.db3").unwrap();
        meta.add_channel("/z", "pkg/msg/Z", "cdr", "", 1).unwrap();
        meta.add_channel("/x", "pkg/msg/X", "cdr", "", 2).unwrap();
        meta.add_channel("/y", "pkg/msg/Y", "cdr", "", 3).unwrap();

        let doc = meta.serialize();
        assert_eq!(doc.information.relative_file_paths, ["a.db3", "b.db3"]);
        let names: Vec<&str> = doc
            .information
            .topics_with_message_count
            .iter()
            .map(|t| t.topic_metadata.topic.as_str())
            .collect();
        assert_eq!(names, ["/z", "/x", "/y"]);
        // Serializing never reorders the stored paths.
        assert_eq!(meta.relative_file_paths(), ["b.db3", "a.db3"]);
    }

    #[test]
    fn serialize_is_idempotent() {
        let mut meta = ArchiveMetadata::new();
        meta.add_relative_paths(["c.db3", "a.db3", "b.db3"]).unwrap();
        meta.add_channel("/a", "pkg/msg/A", "cdr", QOS, 9).unwrap();
        let first = meta.serialize();
        let second = meta.serialize();
        assert_eq!(first, second);
        assert_eq!(first.to_yaml(), second.to_yaml());
    }

    #[test]
    fn duplicate_channel_names_are_kept() {
        let mut meta = ArchiveMetadata::new();
        meta.add_channel("/dup", "pkg/msg/A", "cdr", "", 1).unwrap();
        meta.add_channel("/dup", "pkg/msg/A", "cdr", "", 2).unwrap();
        assert_eq!(meta.serialize().information.topics_with_message_count.len(), 2);
    }

    #[test]
    fn reference_bag_document() {
        let mut meta = ArchiveMetadata::new();
        meta.set_version(4).unwrap();
        meta.set_storage_identifier("sqlite3");
        meta.add_relative_path("cdr_test_0.db3").unwrap();
        meta.set_duration(151_137_181).unwrap();
        meta.set_starting_time(1_586_406_456_763_032_325).unwrap();
        meta.set_message_count(7).unwrap();
        meta.add_channel("/test_topic", "test_msgs/msg/BasicTypes", "cdr", QOS, 3)
            .unwrap();

        let expected = "\
rosbag2_bagfile_information:
  version: 4
  storage_identifier: \"sqlite3\"
  relative_file_paths:
    - \"cdr_test_0.db3\"
  duration:
    nanoseconds: 151137181
  starting_time:
    nanoseconds_since_epoch: 1586406456763032325
  message_count: 7
  topics_with_message_count:
    - topic_metadata:
        topic: \"/test_topic\"
        type: \"test_msgs/msg/BasicTypes\"
        serialization_format: \"cdr\"
        offered_qos_profiles: \"- history: 3\\n  depth: 0\\n  reliability: 1\\n  durability: 2\"
      message_count: 3
  compression_format: \"\"
  compression_mode: \"\"
";
        assert_eq!(meta.serialize().to_yaml(), expected);
    }
}
