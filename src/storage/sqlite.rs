use std::path::Path;

use rusqlite::{Connection, OpenFlags, params};

use super::{Aggregator, ChannelRow, FileStats};
use crate::error::{ReindexError, Result};

pub const SQLITE3_IDENTIFIER: &str = "sqlite3";
pub const SQLITE3_EXTENSION: &str = "db3";

// Rows come back in topic registration order so the channel list is stable for a given file.
const CHANNEL_STATS_SQL: &str = "
SELECT topics.name, topics.type, topics.serialization_format,
       COUNT(messages.id), MIN(messages.timestamp), MAX(messages.timestamp),
       {qos_column}
FROM messages JOIN topics ON topics.id = messages.topic_id
GROUP BY topics.name
ORDER BY MIN(topics.id)";

/// Aggregator for the default embedded `sqlite3` storage (`.db3` files).
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteAggregator;

impl Aggregator for SqliteAggregator {
    fn identifier(&self) -> &str {
        SQLITE3_IDENTIFIER
    }

    fn data_file_extension(&self) -> &str {
        SQLITE3_EXTENSION
    }

    fn aggregate_channel_stats(&self, data_file: &Path) -> Result<FileStats> {
        let conn = open_read_only(data_file)?;
        query_channel_stats(&conn, data_file).map_err(|e| ReindexError::backend_io(data_file, e))
    }
}

fn open_read_only(path: &Path) -> Result<Connection> {
    // A missing file is an I/O error, not a storage error.
    if !path.is_file() {
        return Err(ReindexError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "data file not found"),
        ));
    }
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| ReindexError::backend_io(path, e))
}

fn query_channel_stats(conn: &Connection, path: &Path) -> rusqlite::Result<FileStats> {
    if !table_exists(conn, "messages")? || !table_exists(conn, "topics")? {
        tracing::warn!(path = %path.display(), "no messages/topics tables, treating as empty");
        return Ok(FileStats::default());
    }

    let qos_column = if column_exists(conn, "topics", "offered_qos_profiles")? {
        "topics.offered_qos_profiles"
    } else {
        tracing::warn!(
            path = %path.display(),
            "topics table has no offered_qos_profiles column"
        );
        "''"
    };

    let sql = CHANNEL_STATS_SQL.replace("{qos_column}", qos_column);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(ChannelRow {
            name: row.get(0)?,
            channel_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            serialization_format: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            message_count: row.get(3)?,
            min_timestamp: row.get(4)?,
            max_timestamp: row.get(5)?,
            offered_profiles: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        })
    })?;
    let channels = rows.collect::<rusqlite::Result<Vec<_>>>()?;

    let stats = FileStats::from_rows(channels);
    tracing::debug!(
        path = %path.display(),
        channels = stats.channels.len(),
        messages = stats.message_count(),
        "aggregated data file"
    );
    Ok(stats)
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
