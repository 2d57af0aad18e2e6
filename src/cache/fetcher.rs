//! Serve-from-disk or fetch-and-store policy

use std::future::Future;

use polars::prelude::DataFrame;

use super::{derive_key, CacheDir, Clock, MetadataStore, QueryParams, SystemClock, TableStore, TtlValidator};

/// Wraps remote fetches with the disk cache
///
/// There is no in-memory layer and no locking: every call re-derives the key
/// and goes to disk, and concurrent misses on one key both fetch and both
/// write, last writer wins.
#[derive(Debug, Clone)]
pub struct CachedFetcher<C = SystemClock> {
    dir: CacheDir,
    tables: TableStore,
    metadata: MetadataStore,
    validator: TtlValidator<C>,
}

impl CachedFetcher<SystemClock> {
    /// Creates a fetcher over `dir` using wall-clock time
    pub fn new(dir: CacheDir) -> Self {
        Self::with_clock(dir, SystemClock)
    }
}

impl<C: Clock> CachedFetcher<C> {
    /// Creates a fetcher with a custom time source
    pub fn with_clock(dir: CacheDir, clock: C) -> Self {
        let metadata = MetadataStore::new(dir.clone());
        Self {
            tables: TableStore::new(dir.clone()),
            validator: TtlValidator::new(metadata.clone(), clock),
            metadata,
            dir,
        }
    }

    pub fn dir(&self) -> &CacheDir {
        &self.dir
    }

    pub fn validator(&self) -> &TtlValidator<C> {
        &self.validator
    }

    /// Returns the cached table for `(operation, params)` or fetches it
    ///
    /// # Arguments
    /// * `operation` - Name mixed into the cache key
    /// * `remote` - Called with the params on a miss; its error is returned unchanged
    /// * `ttl_minutes` - Maximum age of a usable cache entry (inclusive)
    /// * `params` - Query parameters, also mixed into the cache key
    /// * `force_refresh` - Skip the freshness check and always call `remote`
    ///
    /// A fresh entry is returned without calling `remote`. An entry whose
    /// payload can't be read falls through to a fetch. Non-empty results are
    /// written back (payload first, then metadata); write failures are logged
    /// and the fetched table is still returned. Empty results are never cached.
    pub async fn fetch_or_cache<F, Fut, E>(
        &self,
        operation: &str,
        remote: F,
        ttl_minutes: u64,
        params: &QueryParams,
        force_refresh: bool,
    ) -> Result<DataFrame, E>
    where
        F: FnOnce(QueryParams) -> Fut,
        Fut: Future<Output = Result<DataFrame, E>>,
    {
        let key = derive_key(operation, params);

        if force_refresh {
            tracing::debug!(operation, key = %key, "Forced refresh, skipping cache");
        } else if self.validator.is_valid(&key, ttl_minutes) {
            match self.tables.read(&key) {
                Ok(table) => {
                    tracing::debug!(operation, key = %key, rows = table.height(), "Cache hit");
                    return Ok(table);
                }
                Err(e) => {
                    tracing::warn!(operation, key = %key, error = %e, "Cached payload unreadable, refetching");
                }
            }
        } else {
            tracing::debug!(operation, key = %key, "Cache miss or expired");
        }

        let table = remote(params.clone()).await?;

        if table.height() > 0 {
            if let Err(e) = self.tables.write(&key, &table) {
                tracing::warn!(operation, key = %key, error = %e, "Failed to write cached payload");
            } else if let Err(e) = self.metadata.write(&key, self.validator.clock().now()) {
                tracing::warn!(operation, key = %key, error = %e, "Failed to write cache metadata");
            } else {
                tracing::debug!(operation, key = %key, rows = table.height(), "Cached fetched table");
            }
        }

        Ok(table)
    }
}
