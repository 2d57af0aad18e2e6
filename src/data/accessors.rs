//! Cached accessors, one per dataset

use polars::prelude::DataFrame;

use super::{search_listed, DataError, Dataset, FetchOptions, RemoteSource, SEARCH_TTL_MINUTES};
use crate::cache::{CacheDir, CachedFetcher, Clock, QueryParams, SystemClock};

/// Cached access to Tushare datasets
///
/// Holds the remote source and the disk cache; the provider credential lives
/// inside the source, fixed at construction.
#[derive(Debug, Clone)]
pub struct TushareData<S, C = SystemClock> {
    source: S,
    cache: CachedFetcher<C>,
}

impl<S: RemoteSource> TushareData<S> {
    /// Creates accessors caching under `dir`
    pub fn new(source: S, dir: CacheDir) -> Self {
        Self::with_fetcher(source, CachedFetcher::new(dir))
    }
}

impl<S: RemoteSource, C: Clock> TushareData<S, C> {
    /// Creates accessors over an existing fetcher
    pub fn with_fetcher(source: S, cache: CachedFetcher<C>) -> Self {
        Self { source, cache }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &CachedFetcher<C> {
        &self.cache
    }

    /// Fetches any dataset through the cache
    ///
    /// Required parameters are checked before the cache or the network is
    /// touched. The dataset's default TTL applies unless `options` overrides it.
    pub async fn fetch(
        &self,
        dataset: Dataset,
        params: QueryParams,
        options: FetchOptions,
    ) -> Result<DataFrame, DataError> {
        dataset.validate(&params)?;
        let spec = dataset.spec();

        let ttl_minutes = options.ttl_minutes.unwrap_or(spec.default_ttl_minutes);
        let source = &self.source;

        let table = self
            .cache
            .fetch_or_cache(
                spec.name,
                move |params| async move { source.fetch(dataset, &params).await },
                ttl_minutes,
                &params,
                options.force_refresh,
            )
            .await?;
        Ok(table)
    }

    /// OHLCV bars; requires `ts_code`
    ///
    /// Also understands `freq` (D/W/M), `asset` (E/I) and `adj` (qfq/hfq).
    pub async fn price_bars(&self, params: QueryParams, options: FetchOptions) -> Result<DataFrame, DataError> {
        self.fetch(Dataset::PriceBars, params, options).await
    }

    /// Dividends; requires one of `ts_code`, `ann_date`, `record_date`,
    /// `ex_date` or `imp_ann_date`
    pub async fn dividends(&self, params: QueryParams, options: FetchOptions) -> Result<DataFrame, DataError> {
        self.fetch(Dataset::Dividends, params, options).await
    }

    pub async fn income_statement(&self, params: QueryParams, options: FetchOptions) -> Result<DataFrame, DataError> {
        self.fetch(Dataset::IncomeStatement, params, options).await
    }

    pub async fn security_master(&self, params: QueryParams, options: FetchOptions) -> Result<DataFrame, DataError> {
        self.fetch(Dataset::SecurityMaster, params, options).await
    }

    pub async fn trading_calendar(&self, params: QueryParams, options: FetchOptions) -> Result<DataFrame, DataError> {
        self.fetch(Dataset::TradingCalendar, params, options).await
    }

    /// Financial indicators; requires `ts_code`
    pub async fn financial_indicators(
        &self,
        params: QueryParams,
        options: FetchOptions,
    ) -> Result<DataFrame, DataError> {
        self.fetch(Dataset::FinancialIndicators, params, options).await
    }

    /// Report disclosure schedule, filterable by `ts_code`, `end_date`,
    /// `pre_date` and `actual_date`
    pub async fn disclosure_schedule(
        &self,
        params: QueryParams,
        options: FetchOptions,
    ) -> Result<DataFrame, DataError> {
        self.fetch(Dataset::DisclosureSchedule, params, options).await
    }

    /// Listed stocks whose code, name or pinyin initials contain `query`
    ///
    /// Searches the full security master, cached for a day unless `options`
    /// sets another TTL. An empty query returns the first `limit` listed
    /// stocks. See [`search_listed`] for the matching rules.
    pub async fn search_stocks(
        &self,
        query: &str,
        limit: usize,
        options: FetchOptions,
    ) -> Result<DataFrame, DataError> {
        let options = FetchOptions {
            ttl_minutes: Some(options.ttl_minutes.unwrap_or(SEARCH_TTL_MINUTES)),
            ..options
        };
        let stocks = self.security_master(QueryParams::new(), options).await?;
        Ok(search_listed(&stocks, query, limit)?)
    }
}
