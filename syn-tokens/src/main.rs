//! syn-tokens - Token lifecycle for linked accounts
//!
//! One-shot tool with two passes: exchange pending authorization codes
//! for token pairs, and refresh access tokens that have expired. A
//! rejected grant is reported per account and never retried inline.

use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use libsyndica::logging::{LogFormat, LoggingConfig};
use libsyndica::platforms::pinterest::PinterestAuth;
use libsyndica::service::tokens::{TokenReport, TokenService};
use libsyndica::{Config, PostStore, Result, SyndicaError};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "syn-tokens")]
#[command(version)]
#[command(about = "Mint and refresh platform access tokens")]
#[command(long_about = "\
syn-tokens - Token lifecycle for linked accounts

DESCRIPTION:
    syn-tokens runs two passes over the account table. The mint pass
    exchanges pending OAuth authorization codes for token pairs and
    clears the consumed code. The refresh pass renews access tokens
    whose expiry has passed, using the stored refresh token.

    A rejected grant means the account link must be re-established by
    the user; it is reported in the output and not retried.

USAGE:
    syn-tokens
    syn-tokens --mint-only
    syn-tokens --refresh-only

OUTPUT:
    A JSON report on stdout with the minted and refreshed entries.

EXIT CODES:
    0 - All accounts processed (individual failures are in the report)
    1 - Runtime error
    3 - Invalid input (e.g. no [pinterest] config section)
")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "FILE", env = "SYNDICA_CONFIG")]
    config: Option<PathBuf>,

    /// Only exchange pending authorization codes
    #[arg(long, conflicts_with = "refresh_only")]
    mint_only: bool,

    /// Only refresh expired tokens
    #[arg(long)]
    refresh_only: bool,

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
    let service = TokenService::new(store, PinterestAuth::new(pinterest));

    let report = if cli.mint_only {
        TokenReport {
            minted: service.mint_tokens().await?,
            refreshed: Vec::new(),
        }
    } else if cli.refresh_only {
        TokenReport {
            minted: Vec::new(),
            refreshed: service.refresh_tokens(Utc::now()).await?,
        }
    } else {
        service.run(Utc::now()).await?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&report)
            .map_err(|e| SyndicaError::InvalidInput(e.to_string()))?
    );

    Ok(())
}
