//! Command-line interface parsing for tuscache
//!
//! One subcommand per dataset, with flags named after the Tushare parameters
//! they set, plus `cache` maintenance commands. Required parameters are not
//! enforced here: the accessors reject incomplete queries themselves.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::cache::QueryParams;
use crate::data::{Dataset, FetchOptions};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// A `--param` value is not `key=value`
    #[error("Invalid parameter: '{0}'. Expected key=value")]
    InvalidParam(String),
}

/// tuscache - cached access to Tushare Pro data
#[derive(Parser, Debug)]
#[command(name = "tuscache")]
#[command(about = "Fetch Tushare Pro datasets through a local parquet cache")]
#[command(version)]
pub struct Cli {
    /// Cache root directory (overrides TUSHARE_CACHE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum age in minutes of a usable cache entry (default depends on the dataset)
    #[arg(long, global = true, value_name = "MINUTES")]
    pub ttl: Option<u64>,

    /// Ignore any cached entry and fetch again
    #[arg(long, global = true)]
    pub refresh: bool,

    /// Print at most this many rows
    #[arg(long, global = true, value_name = "ROWS")]
    pub limit: Option<usize>,

    /// Extra query parameter passed through as-is (repeatable)
    ///
    /// Example: --param fields=ts_code,trade_date,close
    #[arg(long = "param", global = true, value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Price bars (pro_bar)
    Bars(BarsArgs),
    /// Dividend announcements
    Dividend(DividendArgs),
    /// Income statements
    Income(IncomeArgs),
    /// Security master data (stock_basic)
    StockBasic(StockBasicArgs),
    /// Trading calendar (trade_cal)
    TradeCal(TradeCalArgs),
    /// Financial indicators (fina_indicator)
    FinaIndicator(FinaIndicatorArgs),
    /// Report disclosure schedule (disclosure_date)
    DisclosureDate(DisclosureDateArgs),
    /// Search listed stocks by code, name or pinyin initials
    Search(SearchArgs),
    /// Inspect or prune the cache directory
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show entry counts and payload size
    Stats,
    /// Delete entries older than the given age
    Prune {
        /// Maximum age in days of entries to keep
        #[arg(long, value_name = "DAYS", default_value_t = 30)]
        older_than_days: u32,
    },
}

#[derive(Args, Debug, Default)]
pub struct BarsArgs {
    #[arg(long)]
    pub ts_code: Option<String>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    /// Price adjustment: qfq or hfq
    #[arg(long)]
    pub adj: Option<String>,
    /// Bar frequency: D, W or M
    #[arg(long)]
    pub freq: Option<String>,
    /// Asset class: E (stock) or I (index)
    #[arg(long)]
    pub asset: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct DividendArgs {
    #[arg(long)]
    pub ts_code: Option<String>,
    #[arg(long)]
    pub ann_date: Option<String>,
    #[arg(long)]
    pub record_date: Option<String>,
    #[arg(long)]
    pub ex_date: Option<String>,
    #[arg(long)]
    pub imp_ann_date: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct IncomeArgs {
    #[arg(long)]
    pub ts_code: Option<String>,
    #[arg(long)]
    pub ann_date: Option<String>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    #[arg(long)]
    pub period: Option<String>,
    #[arg(long)]
    pub report_type: Option<String>,
    #[arg(long)]
    pub comp_type: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct StockBasicArgs {
    #[arg(long)]
    pub ts_code: Option<String>,
    #[arg(long)]
    pub is_hs: Option<String>,
    /// Listing status: L, D or P
    #[arg(long)]
    pub list_status: Option<String>,
    #[arg(long)]
    pub exchange: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct TradeCalArgs {
    #[arg(long)]
    pub exchange: Option<String>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    #[arg(long)]
    pub is_open: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct FinaIndicatorArgs {
    #[arg(long)]
    pub ts_code: Option<String>,
    #[arg(long)]
    pub ann_date: Option<String>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    #[arg(long)]
    pub period: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct DisclosureDateArgs {
    #[arg(long)]
    pub ts_code: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    #[arg(long)]
    pub pre_date: Option<String>,
    #[arg(long)]
    pub actual_date: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Text to look for; omit to list the first listed stocks
    pub query: Option<String>,
}

/// A dataset request assembled from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    pub dataset: Dataset,
    pub params: QueryParams,
    pub options: FetchOptions,
}

impl Command {
    /// Dataset and flag-derived parameters, or `None` for cache and search
    fn dataset_params(&self) -> Option<(Dataset, QueryParams)> {
        let request = match self {
            Command::Bars(a) => (
                Dataset::PriceBars,
                QueryParams::new()
                    .with_opt("ts_code", a.ts_code.as_deref())
                    .with_opt("start_date", a.start_date.as_deref())
                    .with_opt("end_date", a.end_date.as_deref())
                    .with_opt("adj", a.adj.as_deref())
                    .with_opt("freq", a.freq.as_deref())
                    .with_opt("asset", a.asset.as_deref()),
            ),
            Command::Dividend(a) => (
                Dataset::Dividends,
                QueryParams::new()
                    .with_opt("ts_code", a.ts_code.as_deref())
                    .with_opt("ann_date", a.ann_date.as_deref())
                    .with_opt("record_date", a.record_date.as_deref())
                    .with_opt("ex_date", a.ex_date.as_deref())
                    .with_opt("imp_ann_date", a.imp_ann_date.as_deref()),
            ),
            Command::Income(a) => (
                Dataset::IncomeStatement,
                QueryParams::new()
                    .with_opt("ts_code", a.ts_code.as_deref())
                    .with_opt("ann_date", a.ann_date.as_deref())
                    .with_opt("start_date", a.start_date.as_deref())
                    .with_opt("end_date", a.end_date.as_deref())
                    .with_opt("period", a.period.as_deref())
                    .with_opt("report_type", a.report_type.as_deref())
                    .with_opt("comp_type", a.comp_type.as_deref()),
            ),
            Command::StockBasic(a) => (
                Dataset::SecurityMaster,
                QueryParams::new()
                    .with_opt("ts_code", a.ts_code.as_deref())
                    .with_opt("is_hs", a.is_hs.as_deref())
                    .with_opt("list_status", a.list_status.as_deref())
                    .with_opt("exchange", a.exchange.as_deref()),
            ),
            Command::TradeCal(a) => (
                Dataset::TradingCalendar,
                QueryParams::new()
                    .with_opt("exchange", a.exchange.as_deref())
                    .with_opt("start_date", a.start_date.as_deref())
                    .with_opt("end_date", a.end_date.as_deref())
                    .with_opt("is_open", a.is_open.as_deref()),
            ),
            Command::FinaIndicator(a) => (
                Dataset::FinancialIndicators,
                QueryParams::new()
                    .with_opt("ts_code", a.ts_code.as_deref())
                    .with_opt("ann_date", a.ann_date.as_deref())
                    .with_opt("start_date", a.start_date.as_deref())
                    .with_opt("end_date", a.end_date.as_deref())
                    .with_opt("period", a.period.as_deref()),
            ),
            Command::DisclosureDate(a) => (
                Dataset::DisclosureSchedule,
                QueryParams::new()
                    .with_opt("ts_code", a.ts_code.as_deref())
                    .with_opt("end_date", a.end_date.as_deref())
                    .with_opt("pre_date", a.pre_date.as_deref())
                    .with_opt("actual_date", a.actual_date.as_deref()),
            ),
            Command::Search(_) | Command::Cache(_) => return None,
        };
        Some(request)
    }
}

/// Splits a `key=value` argument
///
/// # Returns
/// * `Ok((key, value))` if the argument has a non-empty key
/// * `Err(CliError::InvalidParam)` otherwise
pub fn parse_param_arg(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidParam(s.to_string())),
    }
}

impl Cli {
    /// Cache controls from the global `--ttl` and `--refresh` flags
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            ttl_minutes: self.ttl,
            force_refresh: self.refresh,
        }
    }

    /// Builds the dataset request, or `None` for cache and search commands
    ///
    /// `--param` values are applied after the dedicated flags and win on
    /// conflicts.
    pub fn data_request(&self) -> Result<Option<DataRequest>, CliError> {
        let Some((dataset, mut params)) = self.command.dataset_params() else {
            return Ok(None);
        };

        for raw in &self.params {
            let (key, value) = parse_param_arg(raw)?;
            params.insert(key, value);
        }

        Ok(Some(DataRequest {
            dataset,
            params,
            options: self.fetch_options(),
        }))
    }
}
