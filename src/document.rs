//! Canonical `metadata.yaml` document and its block-style writer.
//!
//! The layout is a compatibility contract with existing bag readers: fixed key order, two-space
//! nesting everywhere (list items included), every string double-quoted. It is emitted by hand
//! rather than through a generic YAML serializer.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Single top-level key identifying the archive format family.
pub const TOP_LEVEL_KEY: &str = "rosbag2_bagfile_information";

/// File name of the metadata document inside a bag directory.
pub const METADATA_FILENAME: &str = "metadata.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(rename = "rosbag2_bagfile_information")]
    pub information: BagfileInformation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagfileInformation {
    pub version: u64,
    pub storage_identifier: String,
    pub relative_file_paths: Vec<String>,
    pub duration: Duration,
    pub starting_time: StartingTime,
    pub message_count: u64,
    pub topics_with_message_count: Vec<TopicWithMessageCount>,
    pub compression_format: String,
    pub compression_mode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub nanoseconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingTime {
    pub nanoseconds_since_epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicWithMessageCount {
    pub topic_metadata: TopicMetadata,
    pub message_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMetadata {
    pub topic: String,
    #[serde(rename = "type")]
    pub topic_type: String,
    pub serialization_format: String,
    pub offered_qos_profiles: String,
}

impl MetadataDocument {
    /// Render the document as block YAML.
    #[must_use]
    pub fn to_yaml(&self) -> String {
        let info = &self.information;
        let mut out = String::with_capacity(512 + info.topics_with_message_count.len() * 256);

        line(&mut out, 0, format_args!("{TOP_LEVEL_KEY}:"));
        line(&mut out, 1, format_args!("version: {}", info.version));
        line(
            &mut out,
            1,
            format_args!("storage_identifier: {}", quote(&info.storage_identifier)),
        );

        if info.relative_file_paths.is_empty() {
            line(&mut out, 1, format_args!("relative_file_paths: []"));
        } else {
            line(&mut out, 1, format_args!("relative_file_paths:"));
            for path in &info.relative_file_paths {
                line(&mut out, 2, format_args!("- {}", quote(path)));
            }
        }

        line(&mut out, 1, format_args!("duration:"));
        line(
            &mut out,
            2,
            format_args!("nanoseconds: {}", info.duration.nanoseconds),
        );
        line(&mut out, 1, format_args!("starting_time:"));
        line(
            &mut out,
            2,
            format_args!(
                "nanoseconds_since_epoch: {}",
                info.starting_time.nanoseconds_since_epoch
            ),
        );
        line(&mut out, 1, format_args!("message_count: {}", info.message_count));

        if info.topics_with_message_count.is_empty() {
            line(&mut out, 1, format_args!("topics_with_message_count: []"));
        } else {
            line(&mut out, 1, format_args!("topics_with_message_count:"));
            for entry in &info.topics_with_message_count {
                write_topic(&mut out, entry);
            }
        }

        line(
            &mut out,
            1,
            format_args!("compression_format: {}", quote(&info.compression_format)),
        );
        line(
            &mut out,
            1,
            format_args!("compression_mode: {}", quote(&info.compression_mode)),
        );
        out
    }
}

// A list item opens at depth 2 ("- " counts as one level), so its keys sit at depth 3 and the
// nested topic_metadata keys at depth 4.
fn write_topic(out: &mut String, entry: &TopicWithMessageCount) {
    let meta = &entry.topic_metadata;
    line(out, 2, format_args!("- topic_metadata:"));
    line(out, 4, format_args!("topic: {}", quote(&meta.topic)));
    line(out, 4, format_args!("type: {}", quote(&meta.topic_type)));
    line(
        out,
        4,
        format_args!("serialization_format: {}", quote(&meta.serialization_format)),
    );
    line(
        out,
        4,
        format_args!("offered_qos_profiles: {}", quote(&meta.offered_qos_profiles)),
    );
    line(out, 3, format_args!("message_count: {}", entry.message_count));
}

fn line(out: &mut String, depth: usize, text: std::fmt::Arguments<'_>) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    // Writing into a String cannot fail.
    let _ = out.write_fmt(text);
    out.push('\n');
}

/// Double-quoted YAML scalar. Multi-line values such as QoS profiles stay on one line.
pub(crate) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '\u{85}' => out.push_str("\\N"),
            '\u{2028}' => out.push_str("\\L"),
            '\u{2029}' => out.push_str("\\P"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
