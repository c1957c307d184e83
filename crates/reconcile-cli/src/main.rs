//! # Reconcile CLI
//!
//! Merge JSON record snapshots from the command line and print the result.

use anyhow::{Context, Result};
use reconcile_core::{stamp_version_batch, ProductRecord, Reconciler, Record};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod config;

use config::CliConfig;

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let mut config = CliConfig::from_env()?;

    match args[1].as_str() {
        "merge" => {
            let paths = config.apply_args(&args[2..])?;
            if paths.len() != 2 {
                eprintln!("Usage: reconcile merge <local.json> <remote.json> [OPTIONS]");
                std::process::exit(1);
            }

            let local: Vec<Record> = load_snapshot(Path::new(&paths[0]))?;
            let remote: Vec<Record> = load_snapshot(Path::new(&paths[1]))?;

            let result = Reconciler::new(config.merge_options())
                .merge(&local, &remote)
                .context("Merge failed")?;
            tracing::info!(summary = %result.summary(), "Merged snapshots");
            print_json(&result)?;
        }
        "merge-stock" => {
            let paths = config.apply_args(&args[2..])?;
            if paths.len() != 3 {
                eprintln!(
                    "Usage: reconcile merge-stock <local.json> <remote.json> <base.json> [OPTIONS]"
                );
                std::process::exit(1);
            }

            let local: Vec<ProductRecord> = load_snapshot(Path::new(&paths[0]))?;
            let remote: Vec<ProductRecord> = load_snapshot(Path::new(&paths[1]))?;
            let base: Vec<ProductRecord> = load_snapshot(Path::new(&paths[2]))?;

            let result = Reconciler::new(config.merge_options())
                .merge_with_base(&local, &remote, &base)
                .context("Stock merge failed")?;
            tracing::info!(summary = %result.summary(), "Merged stock snapshots");
            print_json(&result)?;
        }
        "stamp" => {
            if args.len() < 3 {
                eprintln!("Usage: reconcile stamp <records.json>");
                std::process::exit(1);
            }

            let records: Vec<Record> = load_snapshot(Path::new(&args[2]))?;
            let stamped = stamp_version_batch(&records);
            tracing::info!(records = stamped.len(), "Stamped records");
            print_json(&stamped)?;
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Read a JSON array of records from `path`.
fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<T> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::debug!(path = %path.display(), records = records.len(), "Loaded snapshot");
    Ok(records)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn print_help() {
    println!(
        r#"Reconcile CLI

USAGE:
    reconcile <COMMAND> [OPTIONS]

COMMANDS:
    merge <local> <remote>               Merge two snapshots by record id
    merge-stock <local> <remote> <base>  Merge stock snapshots, combining quantity deltas
    stamp <records>                      Bump version and timestamp of every record
    help                                 Show this help message

OPTIONS:
    --report-conflicts        Report conflicts instead of auto-resolving them
    --ignore <a,b,...>        Fields excluded from structural comparison
    --duplicates <policy>     `reject` (default) or `last-wins` for repeated ids

ENVIRONMENT:
    RECONCILE_REPORT_CONFLICTS, RECONCILE_IGNORE_FIELDS, RECONCILE_DUPLICATES
    set the same options; flags take precedence. RUST_LOG controls logging.

EXAMPLES:
    reconcile merge local.json remote.json --report-conflicts --ignore updatedAt
    reconcile merge-stock local.json remote.json base.json
"#
    );
}
