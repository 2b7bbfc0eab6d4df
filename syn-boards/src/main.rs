//! syn-boards - Refresh cached board lists
//!
//! One-shot tool that walks every Pinterest account, fetches its full
//! board list from the platform, and replaces the cached copy in the
//! store.

use std::path::PathBuf;

use clap::Parser;
use libsyndica::logging::{LogFormat, LoggingConfig};
use libsyndica::platforms::pinterest::PinterestAuth;
use libsyndica::service::boards::BoardSyncService;
use libsyndica::{Config, PostStore, Result, SyndicaError};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "syn-boards")]
#[command(version)]
#[command(about = "Refresh cached Pinterest board lists")]
#[command(long_about = "\
syn-boards - Refresh cached board lists

DESCRIPTION:
    syn-boards fetches the complete board list for every linked
    Pinterest account (following pagination to the end) and replaces
    the account's cached copy. Board ids from the cache are what the
    publish cycle resolves pins against.

    Accounts are independent: a failing account is reported in the
    output and the rest are still refreshed.

USAGE:
    syn-boards
    syn-boards --config /etc/syndica/config.toml

OUTPUT:
    A JSON report on stdout, one entry per account.

EXIT CODES:
    0 - All accounts processed (individual failures are in the report)
    1 - Runtime error
    3 - Invalid input (e.g. no [pinterest] config section)
")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "FILE", env = "SYNDICA_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
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

    let pinterest = config.pinterest.as_ref().ok_or_else(|| {
        SyndicaError::InvalidInput("no [pinterest] section in configuration".to_string())
    })?;

    let store = PostStore::new(&config.store.path).await?;
    let service = BoardSyncService::new(store, PinterestAuth::new(pinterest));

    let report = service.sync_boards().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report)
            .map_err(|e| SyndicaError::InvalidInput(e.to_string()))?
    );

    Ok(())
}
