//! Typed access to Tushare datasets
//!
//! Each [`Dataset`] has a static [`OperationSpec`] naming its cache operation,
//! the upstream API it maps to, the parameters it requires and its default TTL.
//! [`TushareData`] validates a call against its [`OperationSpec`] and then routes it
//! through the disk cache to a [`RemoteSource`].

pub mod accessors;
pub mod frame;
pub mod provider;
pub mod search;

pub use accessors::TushareData;
pub use frame::RawTable;
pub use provider::{Adjustment, RemoteSource, TushareClient};
pub use search::{search_listed, DEFAULT_SEARCH_LIMIT, SEARCH_TTL_MINUTES};

use std::fmt;

use thiserror::Error;

use crate::cache::QueryParams;

/// One day, in minutes
pub const DAILY_TTL_MINUTES: u64 = 1440;

/// Thirty days, in minutes
pub const MONTHLY_TTL_MINUTES: u64 = 43200;

/// The datasets this crate knows how to fetch and cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// Daily/weekly/monthly OHLCV bars, optionally price-adjusted
    PriceBars,
    /// Dividend and bonus-share announcements
    Dividends,
    /// Income statements
    IncomeStatement,
    /// Listed security master data
    SecurityMaster,
    /// Exchange trading calendar
    TradingCalendar,
    /// Financial indicator ratios
    FinancialIndicators,
    /// Scheduled and actual report disclosure dates
    DisclosureSchedule,
}

/// Which parameters a dataset needs before it may be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// No parameters required
    None,
    /// Every listed parameter must be present
    All(&'static [&'static str]),
    /// At least one listed parameter must be present
    AnyOf(&'static [&'static str]),
}

/// Static description of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    /// Operation name mixed into cache keys
    pub name: &'static str,
    /// Upstream API name
    pub api_name: &'static str,
    pub required: Requirement,
    pub default_ttl_minutes: u64,
}

const PRICE_BARS: OperationSpec = OperationSpec {
    name: "pro_bar",
    api_name: "daily",
    required: Requirement::All(&["ts_code"]),
    default_ttl_minutes: DAILY_TTL_MINUTES,
};

const DIVIDENDS: OperationSpec = OperationSpec {
    name: "dividend",
    api_name: "dividend",
    required: Requirement::AnyOf(&["ts_code", "ann_date", "record_date", "ex_date", "imp_ann_date"]),
    default_ttl_minutes: DAILY_TTL_MINUTES,
};

const INCOME_STATEMENT: OperationSpec = OperationSpec {
    name: "income",
    api_name: "income",
    required: Requirement::None,
    default_ttl_minutes: MONTHLY_TTL_MINUTES,
};

const SECURITY_MASTER: OperationSpec = OperationSpec {
    name: "stock_basic",
    api_name: "stock_basic",
    required: Requirement::None,
    default_ttl_minutes: MONTHLY_TTL_MINUTES,
};

const TRADING_CALENDAR: OperationSpec = OperationSpec {
    name: "trade_cal",
    api_name: "trade_cal",
    required: Requirement::None,
    default_ttl_minutes: MONTHLY_TTL_MINUTES,
};

const FINANCIAL_INDICATORS: OperationSpec = OperationSpec {
    name: "fina_indicator",
    api_name: "fina_indicator",
    required: Requirement::All(&["ts_code"]),
    default_ttl_minutes: MONTHLY_TTL_MINUTES,
};

const DISCLOSURE_SCHEDULE: OperationSpec = OperationSpec {
    name: "disclosure_date",
    api_name: "disclosure_date",
    required: Requirement::None,
    default_ttl_minutes: MONTHLY_TTL_MINUTES,
};

impl Dataset {
    pub const ALL: [Dataset; 7] = [
        Dataset::PriceBars,
        Dataset::Dividends,
        Dataset::IncomeStatement,
        Dataset::SecurityMaster,
        Dataset::TradingCalendar,
        Dataset::FinancialIndicators,
        Dataset::DisclosureSchedule,
    ];

    pub fn spec(self) -> &'static OperationSpec {
        match self {
            Dataset::PriceBars => &PRICE_BARS,
            Dataset::Dividends => &DIVIDENDS,
            Dataset::IncomeStatement => &INCOME_STATEMENT,
            Dataset::SecurityMaster => &SECURITY_MASTER,
            Dataset::TradingCalendar => &TRADING_CALENDAR,
            Dataset::FinancialIndicators => &FINANCIAL_INDICATORS,
            Dataset::DisclosureSchedule => &DISCLOSURE_SCHEDULE,
        }
    }

    /// Checks `params` against the dataset's required parameters
    pub fn validate(self, params: &QueryParams) -> Result<(), ValidationError> {
        let spec = self.spec();
        spec.required.check(spec.name, params)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

impl Requirement {
    /// Checks the parameters of a call to `operation`
    pub fn check(&self, operation: &str, params: &QueryParams) -> Result<(), ValidationError> {
        match self {
            Requirement::None => Ok(()),
            Requirement::All(names) => match names.iter().find(|name| !params.contains(name)) {
                Some(name) => Err(ValidationError::MissingParam {
                    operation: operation.to_string(),
                    param: name.to_string(),
                }),
                None => Ok(()),
            },
            Requirement::AnyOf(names) => {
                if names.iter().any(|name| params.contains(name)) {
                    Ok(())
                } else {
                    Err(ValidationError::MissingAnyOf {
                        operation: operation.to_string(),
                        params: names.join(", "),
                    })
                }
            }
        }
    }
}

/// Per-call cache controls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Overrides the dataset's default TTL
    pub ttl_minutes: Option<u64>,
    /// Skip the freshness check and always fetch
    pub force_refresh: bool,
}

impl FetchOptions {
    pub fn with_ttl(mut self, minutes: u64) -> Self {
        self.ttl_minutes = Some(minutes);
        self
    }

    pub fn refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// A call was rejected before any I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required parameter is absent
    #[error("{operation} requires the '{param}' parameter")]
    MissingParam { operation: String, param: String },

    /// None of a set of alternative parameters is present
    #[error("{operation} requires at least one of: {params}")]
    MissingAnyOf { operation: String, params: String },
}

/// Errors from the remote provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The API answered with a non-zero code (auth, quota, bad params)
    #[error("Tushare API error {code}: {msg}")]
    Api { code: i64, msg: String },

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),

    /// Rows don't line up with the declared fields
    #[error("Malformed table in response: {0}")]
    MalformedTable(String),

    /// Building the frame failed
    #[error("Failed to build table: {0}")]
    Frame(#[from] polars::error::PolarsError),

    /// Parameter value the client can't serve
    #[error("Unsupported option: {0}")]
    Unsupported(String),
}

/// Errors visible to accessor callers
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Remote(#[from] ProviderError),

    /// Post-processing a fetched table failed
    #[error("Failed to filter table: {0}")]
    Table(#[from] polars::error::PolarsError),
}
