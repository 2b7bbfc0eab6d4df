//! syn-publish - Background daemon for due-post publishing
//!
//! Polls the store at regular intervals, selects posts whose scheduled
//! time has arrived, and fans each one out to its linked platform
//! accounts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use libsyndica::hydrate::HmacSigner;
use libsyndica::logging::{LogFormat, LoggingConfig};
use libsyndica::platforms::PublisherRouter;
use libsyndica::service::publish::{PublishOptions, PublishService};
use libsyndica::{Config, PostStore, Result, SyndicaError};
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "syn-publish")]
#[command(version)]
#[command(about = "Background daemon that publishes due posts")]
#[command(long_about = "\
syn-publish - Background daemon for due-post publishing

DESCRIPTION:
    syn-publish is a long-running daemon that polls the Syndica store
    for posts whose scheduled publish time falls inside the recent
    window, resolves their media into fetchable URLs, and publishes
    each one to every linked platform account concurrently.

    Per-account outcomes (including raw platform diagnostics on
    failure) are written back to the post so nothing is lost across
    partial failures or re-runs.

USAGE:
    # Run in foreground (logs to stderr)
    syn-publish

    # Run with custom poll interval
    syn-publish --poll-interval 30

    # Run one cycle, print the JSON report, and exit
    syn-publish --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current cycle)

CONFIGURATION:
    Configuration file: ~/.config/syndica/config.toml
    (override with SYNDICA_CONFIG or --config)

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Authorization error
    3 - Invalid input
")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "FILE", env = "SYNDICA_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between publish cycles (default: 60)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Log output format
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run one cycle, print the JSON report, and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    LoggingConfig::new(cli.log_format, "info".to_string(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let store = PostStore::new(&config.store.path).await?;
    let signer = Arc::new(HmacSigner::new(&config.signer.endpoint, &config.signer.key)?);
    let router = PublisherRouter::from_config(&config);
    let options = PublishOptions::from_config(&config);
    let service = PublishService::new(store, signer, router, options);

    info!("syn-publish daemon starting");

    if cli.once {
        let report = service.run_cycle(Utc::now()).await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| SyndicaError::InvalidInput(e.to_string()))?
        );
        info!("syn-publish: ran one cycle, exiting");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli.poll_interval.unwrap_or(60);
    info!("Poll interval: {}s", poll_interval);

    run_daemon_loop(&service, poll_interval, shutdown).await;

    info!("syn-publish daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| SyndicaError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(service: &PublishService, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        match service.run_cycle(Utc::now()).await {
            Ok(report) => {
                if report.selected > 0 {
                    info!(
                        selected = report.selected,
                        published = report.published_count(),
                        "Publish cycle finished"
                    );
                }
            }
            Err(e) => error!("Publish cycle failed: {}", e),
        }

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}
