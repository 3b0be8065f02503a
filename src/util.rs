use std::ffi::OsStr;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(OsStr::to_str) == Some(ext)
}

/// RFC 3339 rendering of a nanosecond epoch timestamp.
pub fn format_epoch_ns(nanoseconds_since_epoch: u64) -> String {
    let secs = (nanoseconds_since_epoch / NANOS_PER_SECOND) as i64;
    let nanos = (nanoseconds_since_epoch % NANOS_PER_SECOND) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Nanos, true),
        None => format!("{nanoseconds_since_epoch}ns"),
    }
}

pub fn format_duration_ns(nanoseconds: u64) -> String {
    format!(
        "{}.{:09}s",
        nanoseconds / NANOS_PER_SECOND,
        nanoseconds % NANOS_PER_SECOND
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_is_exact() {
        assert!(has_extension(Path::new("bag_0.db3"), "db3"));
        assert!(!has_extension(Path::new("bag_0.db3-wal"), "db3"));
        assert!(!has_extension(Path::new("metadata.yaml"), "db3"));
        assert!(!has_extension(Path::new("db3"), "db3"));
    }

    #[test]
    fn epoch_formatting() {
        assert_eq!(format_epoch_ns(0), "1970-01-01T00:00:00.000000000Z");
        assert_eq!(
            format_epoch_ns(1_586_406_456_763_032_325),
            "2020-04-09T04:27:36.763032325Z"
        );
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration_ns(151_137_181), "0.151137181s");
        assert_eq!(format_duration_ns(2_000_000_001), "2.000000001s");
    }
}
