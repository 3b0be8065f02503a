use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bagreindex")]
#[command(about = "Rebuild metadata.yaml for a rosbag2 bag from its data files", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub(crate) verbose: bool,
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Reconstruct metadata.yaml for a bag directory.
    Reindex {
        bag_dir: PathBuf,
        /// Storage identifier of the bag's data files. Default: sqlite3
        #[arg(short, long = "storage")]
        storage_id: Option<String>,
        /// Serialization format for topics that do not record one. Default: cdr
        #[arg(long)]
        serialization_format: Option<String>,
        /// Compression format recorded in the metadata (e.g. zstd)
        #[arg(long)]
        compression_format: Option<String>,
        /// Compression mode recorded in the metadata (file | message)
        #[arg(long)]
        compression_mode: Option<String>,
        /// JSON file with defaults for the options above
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the document instead of writing it.
        #[arg(long)]
        dry_run: bool,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },

    /// Aggregate a single data file and print its per-topic statistics.
    Inspect {
        data_file: PathBuf,
        #[arg(short, long = "storage", default_value = "sqlite3")]
        storage_id: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// List the supported storage identifiers.
    Backends,
}
