//! Snapshot Archiver main entry point
//!
//! This is the command-line interface for archiving web pages and
//! directory trees into YAML snapshots.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use snapshot_archiver::archiver::{ArchiveOutcome, Archiver};
use snapshot_archiver::config::{load_config_with_hash, load_or_default, Config};
use snapshot_archiver::output::print_statistics;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Snapshot Archiver: resource-bounded web and file-system snapshots
///
/// Archives a web page with its images, videos, stylesheets and scripts, or
/// a directory tree with the processed contents of its files, into one YAML
/// document.
#[derive(Parser, Debug)]
#[command(name = "snapshot-archiver")]
#[command(version = "1.0.0")]
#[command(about = "Archive web pages and directory trees", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory receiving the snapshot
    #[arg(short, long, value_name = "DIR", global = true)]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Validate config and show the effective settings without archiving
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Archive a web page and its resources
    Site {
        /// Page URL (http or https)
        url: String,
    },

    /// Archive a directory tree
    System {
        /// Directory to archive
        path: PathBuf,

        /// Largest file whose contents are read, in bytes
        #[arg(long)]
        max_file_size: Option<u64>,

        /// Include hidden files and directories
        #[arg(long)]
        include_hidden: bool,

        /// Only archive files whose names match this glob
        #[arg(long)]
        pattern: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => load_or_default(None)?,
    };

    if let Mode::System {
        max_file_size,
        include_hidden,
        ..
    } = &cli.mode
    {
        if let Some(max) = max_file_size {
            config.limits.max_file_size = *max;
        }
        if *include_hidden {
            config.scan.include_hidden = true;
        }
    }

    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.default_dir));

    if cli.dry_run {
        handle_dry_run(&config, &cli.mode, &output_dir);
        return Ok(());
    }

    let bar = create_progress_bar(cli.quiet);
    let progress_bar = bar.clone();
    let archiver = Archiver::new(Arc::new(config))
        .on_progress(Arc::new(move |percent| progress_bar.set_position(percent as u64)));

    let run = async {
        match &cli.mode {
            Mode::Site { url } => archiver.archive_site(url, &output_dir).await,
            Mode::System { path, pattern, .. } => {
                archiver
                    .archive_system(path, &output_dir, pattern.as_deref())
                    .await
            }
        }
    };

    let result = tokio::select! {
        result = run => result,
        _ = tokio::signal::ctrl_c() => {
            bar.abandon_with_message("interrupted");
            tracing::error!("Interrupted, no snapshot written");
            std::process::exit(1);
        }
    };

    match result {
        Ok(ArchiveOutcome { path, statistics }) => {
            bar.finish_with_message("done");
            if cli.quiet {
                println!("{}", path.display());
            } else {
                print_statistics(&path, &statistics);
            }
            Ok(())
        }
        Err(e) => {
            bar.abandon_with_message("failed");
            tracing::error!("Archive failed: {}", e);
            eprintln!("Snapshot failed; see the log for details");
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("snapshot_archiver=info,warn"),
            1 => EnvFilter::new("snapshot_archiver=debug,info"),
            2 => EnvFilter::new("snapshot_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Progress bar fed with cumulative percentages
fn create_progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.green/dim}] {pos}% {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, mode: &Mode, output_dir: &std::path::Path) {
    println!("=== Snapshot Archiver Dry Run ===\n");

    match mode {
        Mode::Site { url } => println!("Mode: site ({})", url),
        Mode::System { path, pattern, .. } => {
            println!("Mode: system ({})", path.display());
            if let Some(pattern) = pattern {
                println!("  Pattern: {}", pattern);
            }
        }
    }
    println!("Output directory: {}", output_dir.display());

    println!("\nDownload:");
    println!("  Max concurrent: {}", config.download.max_concurrent);
    println!("  Timeout: {}s", config.download.timeout_seconds);
    println!(
        "  Retries: {} ({}ms apart)",
        config.download.retry_attempts, config.download.retry_delay_ms
    );
    println!("  User agent: {}", config.download.user_agent);

    println!("\nLimits:");
    println!("  Memory: {} bytes", config.limits.max_memory_bytes);
    println!("  CPU: {:.1}%", config.limits.max_cpu_percent);
    println!(
        "  Bandwidth: {} bytes/s",
        config.limits.max_bandwidth_bytes_per_sec
    );
    println!("  Connections: {}", config.limits.max_connections);
    println!("  File size: {} bytes", config.limits.max_file_size);
    match config.limits.max_depth {
        Some(depth) => println!("  Depth: {}", depth),
        None => println!("  Depth: unlimited"),
    }

    println!("\nScan:");
    println!("  Batch size: {}", config.scan.batch_size);
    println!("  Skip binary: {}", config.scan.skip_binary);
    println!("  Include hidden: {}", config.scan.include_hidden);
    println!(
        "  Excluded directories: {}",
        config.scan.excluded_directories.join(", ")
    );
    println!("  Excluded files: {}", config.scan.excluded_files.join(", "));

    println!("\nSecurity:");
    println!(
        "  Allowed protocols: {}",
        config.security.allowed_protocols.join(", ")
    );
    println!("  Restricted paths: {}", config.security.restricted_paths.len());

    println!("\n✓ Configuration is valid");
}
