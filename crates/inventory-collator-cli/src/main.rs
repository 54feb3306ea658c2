mod commands;
mod export;
mod logging;
mod progress;

use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use inventory_collator_core::identity;
use inventory_collator_core::storage::models::ScanStatus;
use inventory_collator_core::storage::Database;
use inventory_collator_core::{AppConfig, ScanEngine, ScanOptions, ScanSummary};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    dotenv().ok();

    let guard = logging::init_logger();

    let config = match inventory_collator_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    let db_path = args
        .db
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.database_path.clone());

    let outcome = match args.command {
        Some(Commands::Scan {
            root,
            fast,
            force_new,
            test_mode,
            label,
            rescan,
        }) => {
            let options = ScanOptions {
                fast,
                force_new_identity: force_new,
                file_limit: test_mode.then_some(config.test_mode_file_limit),
                label,
                rescan_mode: rescan.unwrap_or(config.rescan_mode),
                ..ScanOptions::new(root)
            };
            run_scan(&config, &db_path, options)
        }
        Some(Commands::Identify { root, force_new }) => run_identify(&root, force_new),
        Some(Commands::Volumes) => run_volumes(&db_path),
        Some(Commands::Missing { volume_key }) => run_missing(&db_path, &volume_key),
        Some(Commands::Export { volume_key, output }) => {
            Database::open(&db_path)
                .map_err(anyhow::Error::from)
                .and_then(|db| export::export_volume(&db, &volume_key, &output))
                .map(|count| {
                    info!(
                        "Exported {} entries to {}",
                        count.to_string().green(),
                        output.display()
                    );
                })
        }
        Some(Commands::PrintConfig) => {
            toml::to_string_pretty(&config)
                .map(|rendered| println!("{}", rendered))
                .map_err(anyhow::Error::from)
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {:#}", err);
        drop(guard);
        process::exit(1);
    }

    Ok(())
}

fn run_scan(config: &AppConfig, db_path: &str, mut options: ScanOptions) -> Result<()> {
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel_flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        warn!("Unable to install Ctrl-C handler: {}", e);
    }
    options.cancel_flag = Some(cancel_flag);

    let db = Database::open(db_path)?;
    let engine = ScanEngine::new(config.clone());
    let reporter = CliReporter::new();

    info!("Scanning {} into {}", options.volume_root.display(), db_path);
    let summary = engine.scan(&db, &options, &reporter)?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ScanSummary) {
    println!();
    let identity = if summary.identity_created {
        "new identity".yellow()
    } else {
        "resumed".green()
    };
    info!("Volume {} ({})", summary.volume_key.cyan(), identity);
    info!(
        "{} files seen, {} audio files, {} scanned in {}",
        summary.files_seen.to_string().green(),
        summary.audio_files.to_string().green(),
        human_readable_size(summary.bytes_scanned).green(),
        format!("{:.2}s", summary.duration.as_secs_f64()).green(),
    );
    info!(
        "{} hashed, {} hashes reused, {} skipped on I/O errors",
        summary.hashed_files,
        summary.reused_hashes,
        summary.skipped_files,
    );
    if summary.missing_files > 0 {
        info!(
            "{} entries missing from this volume",
            summary.missing_files.to_string().red()
        );
    }
    if !summary.completed {
        warn!(
            "Scan stopped early; entries not visited stay missing until a full scan (run {})",
            summary.run_id
        );
    }
}

fn run_identify(root: &Path, force_new: bool) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("Volume root is not a directory: {}", root.display());
    }
    let identity = identity::resolve_identity(root, force_new)?;
    let state = if identity.created {
        "created".yellow()
    } else {
        "existing".green()
    };
    println!("{} ({})", identity.volume_key, state);
    Ok(())
}

fn run_volumes(db_path: &str) -> Result<()> {
    let db = Database::open(db_path)?;
    let volumes = db.list_volumes()?;
    if volumes.is_empty() {
        println!("No volumes cataloged");
        return Ok(());
    }
    for volume in volumes {
        let counts = db.count_files_by_status(&volume.volume_key)?;
        println!(
            "{}  {:<16} active: {:>7}  missing: {:>7}  last seen: {}  at {}",
            volume.volume_key.cyan(),
            volume.label.as_deref().unwrap_or("-"),
            counts.active.to_string().green(),
            counts.missing.to_string().red(),
            volume.last_seen_at,
            volume.last_root_path.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn run_missing(db_path: &str, volume_key: &str) -> Result<()> {
    let db = Database::open(db_path)?;
    if db.get_volume(volume_key)?.is_none() {
        anyhow::bail!("Volume {} is not in the catalog", volume_key);
    }
    let missing = db.list_files(volume_key, Some(ScanStatus::Missing))?;
    for entry in &missing {
        println!(
            "{}  {:>10}  last seen {}",
            entry.relative_path,
            human_readable_size(entry.size_bytes.max(0) as u64),
            entry.last_seen_at
        );
    }
    info!("{} missing entries", missing.len().to_string().red());
    Ok(())
}

fn human_readable_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB", "PB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} EB", size)
}
