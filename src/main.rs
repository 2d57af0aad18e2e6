//! tuscache - fetch Tushare Pro datasets through a local parquet cache
//!
//! Reads `TUSHARE_TOKEN` (and optional overrides) from the environment or a
//! `.env` file, runs one dataset query, stock search or cache command, and
//! prints the result.

use std::process::ExitCode;

use chrono::{Duration, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tuscache::cache::{CacheDir, Clock, SystemClock};
use tuscache::cli::{CacheCommand, Cli, Command, SearchArgs};
use tuscache::config::Config;
use tuscache::data::{TushareData, DEFAULT_SEARCH_LIMIT};

/// Sends log output to stderr so tables on stdout stay clean
///
/// Defaults to warnings only; `RUST_LOG=tuscache=debug` shows cache decisions.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_cache_command(dir: &CacheDir, command: &CacheCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        CacheCommand::Stats => {
            let stats = dir.stats()?;
            println!("Cache root:     {}", dir.root().display());
            println!("Entries:        {}", stats.entries);
            println!("Metadata files: {}", stats.metadata_files);
            println!("Payload bytes:  {}", stats.payload_bytes);
        }
        CacheCommand::Prune { older_than_days } => {
            let max_age = Duration::days(i64::from(*older_than_days));
            let report = dir.prune(max_age, SystemClock.now())?;
            println!(
                "Removed {} expired and {} orphaned entries, kept {}",
                report.expired, report.orphaned, report.kept
            );
        }
    }
    Ok(())
}

async fn run_search(cli: &Cli, config: &Config, args: &SearchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let data = TushareData::new(config.client()?, config.cache_dir.clone());
    let query = args.query.as_deref().unwrap_or("");
    let found = data
        .search_stocks(query, cli.limit.unwrap_or(DEFAULT_SEARCH_LIMIT), cli.fetch_options())
        .await?;
    tracing::info!(query, matches = found.height(), "Search finished");
    println!("{}", found);
    Ok(())
}

async fn run_query(cli: &Cli, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let Some(request) = cli.data_request()? else {
        return Ok(());
    };
    // Reject incomplete queries before asking for a token
    request.dataset.validate(&request.params)?;

    let data = TushareData::new(config.client()?, config.cache_dir.clone());
    let started = Utc::now();
    let table = data.fetch(request.dataset, request.params, request.options).await?;
    tracing::info!(
        dataset = %request.dataset,
        rows = table.height(),
        elapsed_ms = (Utc::now() - started).num_milliseconds(),
        "Query finished"
    );

    match cli.limit {
        Some(rows) => println!("{}", table.head(Some(rows))),
        None => println!("{}", table),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env(cli.cache_dir.clone())?;

    match &cli.command {
        Command::Cache(command) => run_cache_command(&config.cache_dir, command),
        Command::Search(args) => run_search(&cli, &config, args).await,
        _ => run_query(&cli, &config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; real environment variables still apply
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
