mod cli;

use bagreindex::util::{format_duration_ns, format_epoch_ns};
use std::path::Path;

use bagreindex::{
    BackendRegistry, FileStats, ReindexConfig, ReindexError, ReindexPlan, ReindexSummary,
    load_config, plan_reindex, reindex_with,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let registry = BackendRegistry::default();

    match cli.command {
        Command::Reindex {
            bag_dir,
            storage_id,
            serialization_format,
            compression_format,
            compression_mode,
            config,
            dry_run,
            json,
        } => {
            let mut settings = match &config {
                Some(path) => load_config(path)?,
                None => ReindexConfig::default(),
            };
            if let Some(value) = storage_id {
                settings.storage_id = value;
            }
            if let Some(value) = serialization_format {
                settings.serialization_format = value;
            }
            if let Some(value) = compression_format {
                settings.compression_format = value;
            }
            if let Some(value) = compression_mode {
                settings.compression_mode = value;
            }

            if dry_run {
                let plan = plan_reindex(&registry, &bag_dir, &settings)
                    .unwrap_or_else(|err| exit_with_error(&registry, err));
                print!("{}", render_dry_run(&plan, &bag_dir, json)?);
                return Ok(());
            }

            let summary = reindex_with(&registry, &bag_dir, &settings)
                .unwrap_or_else(|err| exit_with_error(&registry, err));
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(())
        }

        Command::Inspect {
            data_file,
            storage_id,
            json,
        } => {
            let stats = registry
                .get(&storage_id)
                .and_then(|backend| backend.aggregate_channel_stats(&data_file))
                .unwrap_or_else(|err| exit_with_error(&registry, err));
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_file_stats(&stats);
            }
            Ok(())
        }

        Command::Backends => {
            for backend in registry.iter() {
                println!("{}\t.{}", backend.identifier(), backend.data_file_extension());
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Unsupported backends and validation failures exit 2, any other failure exits 1.
fn exit_with_error(registry: &BackendRegistry, err: ReindexError) -> ! {
    match &err {
        ReindexError::UnsupportedBackend { .. } => {
            let known: Vec<&str> = registry.iter().map(|b| b.identifier()).collect();
            eprintln!("{err}. Supported storage types: {}", known.join(", "));
            std::process::exit(2);
        }
        ReindexError::Validation(_) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
        _ => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}

/// Dry-run output: the document that would be written, or the summary as JSON.
fn render_dry_run(plan: &ReindexPlan, bag_dir: &Path, json: bool) -> serde_json::Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(&plan.summary(bag_dir, None))?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(plan.metadata.serialize().to_yaml())
    }
}

fn print_summary(summary: &ReindexSummary) {
    if let Some(path) = &summary.metadata_path {
        println!("Wrote {}", path.display());
    }
    println!("Storage: {}", summary.storage_identifier);
    println!(
        "Files: {} ({} bytes)",
        summary.relative_file_paths.len(),
        summary.bag_size_bytes
    );
    for path in &summary.relative_file_paths {
        println!("  {path}");
    }
    println!("Topics: {}", summary.channel_count);
    println!("Messages: {}", summary.message_count);
    println!("Start: {}", format_epoch_ns(summary.starting_time_ns));
    println!("Duration: {}", format_duration_ns(summary.duration_ns));
}

fn print_file_stats(stats: &FileStats) {
    match stats.time_bounds() {
        Some((min, max)) => println!(
            "Time range: {} .. {}",
            format_timestamp(min),
            format_timestamp(max)
        ),
        None => println!("Time range: no messages"),
    }
    println!("Messages: {}", stats.message_count());
    for channel in &stats.channels {
        println!(
            "  {} [{}] {} count={}",
            channel.name, channel.channel_type, channel.serialization_format, channel.message_count
        );
    }
}

fn format_timestamp(ns: i64) -> String {
    u64::try_from(ns)
        .map(format_epoch_ns)
        .unwrap_or_else(|_| format!("{ns}ns"))
}
